//! DirectReference: the contract application identifiers must satisfy.

use core::hash::Hash;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// An internal identifier that must not reach untrusted clients.
///
/// Equality and hashing define the logical identity of a reference: two
/// values that compare equal share one entry (and one token) in a
/// [`ReferenceMap`](crate::ReferenceMap). `Hash` must be consistent with
/// `Eq`, as for `HashMap` keys.
///
/// `is_empty_reference` marks values that add/remove treat as a no-op.
/// Most key types never are; implement the trait with an empty block:
///
/// ```
/// use indirect_ref_map::DirectReference;
///
/// #[derive(Clone, PartialEq, Eq, Hash)]
/// struct AccountKey { tenant: u32, id: u64 }
///
/// impl DirectReference for AccountKey {}
/// ```
pub trait DirectReference: Eq + Hash {
    fn is_empty_reference(&self) -> bool {
        false
    }
}

impl<T: DirectReference + ?Sized> DirectReference for &T {
    fn is_empty_reference(&self) -> bool {
        (**self).is_empty_reference()
    }
}

impl<T: DirectReference + ?Sized> DirectReference for Box<T> {
    fn is_empty_reference(&self) -> bool {
        (**self).is_empty_reference()
    }
}

impl DirectReference for str {
    fn is_empty_reference(&self) -> bool {
        self.is_empty()
    }
}

impl DirectReference for String {
    fn is_empty_reference(&self) -> bool {
        self.is_empty()
    }
}

impl DirectReference for Cow<'_, str> {
    fn is_empty_reference(&self) -> bool {
        self.is_empty()
    }
}

impl DirectReference for Path {
    fn is_empty_reference(&self) -> bool {
        self.as_os_str().is_empty()
    }
}

impl DirectReference for PathBuf {
    fn is_empty_reference(&self) -> bool {
        self.as_os_str().is_empty()
    }
}

impl<T: DirectReference> DirectReference for [T] {
    fn is_empty_reference(&self) -> bool {
        self.is_empty()
    }
}

impl<T: DirectReference> DirectReference for Vec<T> {
    fn is_empty_reference(&self) -> bool {
        self.is_empty()
    }
}

impl<T: DirectReference> DirectReference for Option<T> {
    fn is_empty_reference(&self) -> bool {
        match self {
            Some(v) => v.is_empty_reference(),
            None => true,
        }
    }
}

// Numeric ids are never empty; zero is a valid row key.
macro_rules! never_empty {
    ($($t:ty),* $(,)?) => {
        $(impl DirectReference for $t {})*
    };
}

never_empty!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, char, bool);

macro_rules! tuple_reference {
    ($($name:ident),+) => {
        impl<$($name: DirectReference),+> DirectReference for ($($name,)+) {}
    };
}

tuple_reference!(A);
tuple_reference!(A, B);
tuple_reference!(A, B, C);
tuple_reference!(A, B, C, D);
