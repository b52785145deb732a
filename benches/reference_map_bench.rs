use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use indirect_ref_map::{Alphabet, ReferenceMap, RngTokenSource, TokenConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("row:{:016x}", n)
}

// Wide keyspace so minting cost, not retries, dominates.
fn wide_map() -> ReferenceMap<String, RngTokenSource<ChaCha20Rng>> {
    let config = TokenConfig::default()
        .with_alphabet(Alphabet::alphanumeric())
        .with_length(16);
    ReferenceMap::with_source(config, RngTokenSource::new(ChaCha20Rng::seed_from_u64(1)))
        .unwrap()
}

fn bench_add(c: &mut Criterion) {
    c.bench_function("reference_map_add_10k", |b| {
        b.iter_batched(
            wide_map,
            |m| {
                for x in lcg(1).take(10_000) {
                    m.add_direct_reference(key(x)).unwrap();
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_indirect_hit(c: &mut Criterion) {
    c.bench_function("reference_map_get_indirect_hit", |b| {
        let m = wide_map();
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        m.update(keys.iter().cloned()).unwrap();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get_indirect_reference(k.as_str()));
        })
    });
}

fn bench_get_direct_hit(c: &mut Criterion) {
    c.bench_function("reference_map_get_direct_hit", |b| {
        let m = wide_map();
        m.update(lcg(7).take(20_000).map(key)).unwrap();
        let tokens: Vec<_> = m
            .direct_references()
            .filter_map(|d| m.get_indirect_reference(&d))
            .collect();
        let mut it = tokens.iter().cycle();
        b.iter(|| {
            let t = it.next().unwrap();
            black_box(m.get_direct_reference(t).unwrap());
        })
    });
}

fn bench_get_direct_miss(c: &mut Criterion) {
    c.bench_function("reference_map_get_direct_miss", |b| {
        let m = wide_map();
        m.update(lcg(11).take(10_000).map(key)).unwrap();
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // forged tokens outside the alphabet shape
            let t = format!("{:016x}", miss.next().unwrap());
            black_box(m.get_direct_reference(&t).is_err());
        })
    });
}

fn bench_update_half_retained(c: &mut Criterion) {
    c.bench_function("reference_map_update_5k_half_retained", |b| {
        let first: Vec<_> = lcg(3).take(5_000).map(key).collect();
        let second: Vec<_> = first
            .iter()
            .take(2_500)
            .cloned()
            .chain(lcg(5).take(2_500).map(key))
            .collect();
        b.iter_batched(
            || {
                let m = wide_map();
                m.update(first.iter().cloned()).unwrap();
                m
            },
            |m| {
                m.update(second.iter().cloned()).unwrap();
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_add, bench_get_indirect_hit, bench_get_direct_hit,
        bench_get_direct_miss, bench_update_half_retained
}
criterion_main!(benches);
