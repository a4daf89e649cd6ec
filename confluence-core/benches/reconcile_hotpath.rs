use confluence_core::{
    reconcile, retain_last_result, CompositeState, DatasourceError, DefaultLoadImpulseType,
    LoadImpulse, State,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("bench error")]
struct BenchError;

impl DatasourceError for BenchError {}

type BenchState = State<Vec<u64>, String, DefaultLoadImpulseType, BenchError>;
type BenchComposite = CompositeState<Vec<u64>, String, DefaultLoadImpulseType, BenchError>;

fn impulse(parameters: &str) -> LoadImpulse<String, DefaultLoadImpulseType> {
    LoadImpulse::initial(parameters.to_string())
}

fn bench_reconcile(c: &mut Criterion) {
    let items: Vec<u64> = (0..256).collect();
    let primary = BenchState::loading(impulse("feed"));
    let cache = BenchState::success(items.clone(), impulse("feed"));
    let current = impulse("feed");

    c.bench_function("reconcile/loading_with_cache", |b| {
        b.iter(|| {
            let merged = reconcile(black_box(&primary), black_box(&cache), black_box(&current));
            black_box(merged.should_persist);
        });
    });

    let fresh = BenchState::success(items.clone(), impulse("feed"));
    c.bench_function("reconcile/fresh_success", |b| {
        b.iter(|| {
            let merged = reconcile(black_box(&fresh), black_box(&cache), black_box(&current));
            black_box(merged.state);
        });
    });

    let stale = BenchState::success(items.clone(), impulse("other"));
    c.bench_function("reconcile/stale_result", |b| {
        b.iter(|| {
            let merged = reconcile(black_box(&stale), black_box(&cache), black_box(&current));
            black_box(merged.state);
        });
    });

    let latest = BenchComposite::from(BenchState::failure(BenchError, impulse("feed")));
    let last = BenchComposite::Success {
        value: items,
        load_impulse: impulse("feed"),
    };
    c.bench_function("retain/error_with_history", |b| {
        b.iter(|| black_box(retain_last_result(black_box(&latest), Some(black_box(&last)))));
    });
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
