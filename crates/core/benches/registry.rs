use bridge_core::{Handle, Registry, Scope};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_add_get_delete(c: &mut Criterion) {
    let registry: Registry<Arc<u64>> = Registry::new();
    let value = Arc::new(7u64);

    c.bench_function("registry_add_get_delete", |b| {
        b.iter(|| {
            let h = registry.add(Arc::clone(&value));
            black_box(registry.get(black_box(h)));
            registry.delete(h);
        })
    });
}

fn bench_get_populated(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_get");

    for &live in &[16usize, 1_024, 65_536] {
        let registry: Registry<Arc<u64>> = Registry::new();
        let handles: Vec<Handle> = (0..live as u64).map(|i| registry.add(Arc::new(i))).collect();
        let probe = handles[live / 2];

        group.bench_with_input(BenchmarkId::new("live", live), &live, |b, _| {
            b.iter(|| black_box(registry.get(black_box(probe))))
        });
    }

    group.finish();
}

fn bench_scope_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_cancel");

    for &fanout in &[1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::new("children", fanout), &fanout, |b, &n| {
            b.iter(|| {
                let root = Scope::root("bench");
                let children: Vec<Scope> = (0..n).map(|_| root.child("upload")).collect();
                root.cancel();
                black_box(children.iter().all(Scope::is_cancelled))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_add_get_delete,
    bench_get_populated,
    bench_scope_tree
);
criterion_main!(benches);
