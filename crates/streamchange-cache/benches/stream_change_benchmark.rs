use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use streamchange_cache::{NoopRegistry, StreamChangeCache};
use std::hint::black_box;

fn generate_entity(index: usize) -> String {
    format!("!room_{}:example.org", index)
}

fn populated_cache(size: usize) -> StreamChangeCache<String> {
    let cache =
        StreamChangeCache::with_max_size("bench", 0, size, NoopRegistry::shared()).unwrap();
    for i in 0..size {
        cache.entity_has_changed(generate_entity(i), (i + 1) as i64);
    }
    cache
}

/// Recording past capacity, so every insert also evicts
fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_has_changed");

    for cache_size in [1_000usize, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::new("evicting", cache_size),
            cache_size,
            |b, &size| {
                let cache = populated_cache(size);
                let mut pos = size as i64;
                b.iter(|| {
                    pos += 1;
                    cache.entity_has_changed(generate_entity(fastrand::usize(0..size * 2)), pos);
                });
            },
        );
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");
    let size = 10_000;
    let cache = populated_cache(size);

    group.bench_function("has_entity_changed", |b| {
        b.iter(|| {
            let entity = generate_entity(fastrand::usize(0..size));
            black_box(cache.has_entity_changed(&entity, (size / 2) as i64))
        });
    });

    for requested in [10usize, 100, 20_000].iter() {
        let entities: Vec<String> = (0..*requested)
            .map(|_| generate_entity(fastrand::usize(0..size * 2)))
            .collect();
        group.bench_with_input(
            BenchmarkId::new("get_entities_changed", requested),
            &entities,
            |b, entities| {
                b.iter(|| {
                    black_box(
                        cache.get_entities_changed(entities.iter().cloned(), (size - 100) as i64),
                    )
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_record, bench_queries);
criterion_main!(benches);
