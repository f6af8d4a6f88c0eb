//! # Strategy Benchmarks
//!
//! Selection cost of each strategy across pool sizes, plus the admission hot path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use service_balancer::{Destination, LoadBalancerManager, Request, Service, StrategyKind};

fn manager_with_pool(size: usize) -> LoadBalancerManager {
    let service = Service::with_destinations(
        "bench",
        (0..size).map(|i| Destination::shared(format!("10.0.{}.{}", i / 256, i % 256), 1_000)),
    );
    let manager = LoadBalancerManager::new();
    manager.register_service("http", Arc::new(service));
    manager
}

fn benchmark_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");

    for size in [3usize, 32, 256] {
        let manager = manager_with_pool(size);
        let request = Request::new("REQ12345", "http");

        for kind in StrategyKind::ALL {
            group.bench_with_input(
                BenchmarkId::new(kind.algorithm_name(), size),
                &size,
                |b, _| b.iter(|| black_box(manager.select(kind, &request).unwrap())),
            );
        }
    }

    group.finish();
}

fn benchmark_admission(c: &mut Criterion) {
    let destination = Destination::shared("10.0.0.1", 1_000);

    c.bench_function("accept_complete", |b| {
        b.iter(|| {
            if black_box(destination.accept()) {
                destination.complete();
            }
        })
    });
}

criterion_group!(benches, benchmark_selection, benchmark_admission);
criterion_main!(benches);
