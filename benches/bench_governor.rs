//! Micro-benchmarks for the admission hot path.
//!
//! Everything runs in-process against a fixed memory reading, so the numbers
//! reflect lock and bookkeeping cost only.
//!
//! ## Run
//! ```bash
//! cargo bench --bench bench_governor
//! ```

use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dashboard_governor_lib::governor::{
    resolve_endpoint, Endpoint, MemoryProbe, MetricsRecorder, Outcome, UserId,
};
use dashboard_governor_lib::{GovernorConfig, RequestGovernor};
use http::StatusCode;

struct SteadyMemory;

impl MemoryProbe for SteadyMemory {
    fn memory_percent(&self) -> dashboard_governor_lib::Result<f64> {
        Ok(42.0)
    }
}

fn governor() -> RequestGovernor {
    RequestGovernor::new(GovernorConfig::default(), Arc::new(SteadyMemory))
}

fn bench_resolve(c: &mut Criterion) {
    c.bench_function("resolve_endpoint", |b| {
        b.iter(|| {
            resolve_endpoint(
                black_box("/api/dashboard/"),
                black_box("/api/dashboard/v1/performance-metrics/daily"),
            )
        });
    });
}

fn bench_admit_complete(c: &mut Criterion) {
    // Stats has no quota, so every iteration is admitted and recorded.
    let governor = governor();
    let user = UserId::from("bench");
    c.bench_function("admit_complete_unlimited", |b| {
        b.iter(|| {
            let metadata = governor.admit(&user, Endpoint::Stats).unwrap_or_else(|r| panic!("{r}"));
            governor.complete(&user, &metadata, Outcome::Status(StatusCode::OK))
        });
    });

    // Overview is limited; spread users so the limiter stays on the admit path.
    let mut group = c.benchmark_group("admit_rate_limited_endpoint");
    for users in [10u64, 1_000] {
        let governor = governor();
        let ids: Vec<UserId> = (0..users).map(UserId::from).collect();
        let mut i = 0usize;
        group.bench_with_input(BenchmarkId::from_parameter(users), &ids, |b, ids| {
            b.iter(|| {
                i = i.wrapping_add(1);
                black_box(governor.admit(&ids[i % ids.len()], Endpoint::Overview).is_ok())
            });
        });
    }
    group.finish();
}

fn bench_recorder(c: &mut Criterion) {
    let recorder = MetricsRecorder::default();
    let user = UserId::from("bench");
    let now = Instant::now();
    for _ in 0..50 {
        recorder.record_at(&user, Endpoint::Export, Duration::from_millis(40), true, now);
    }
    for sample in [40.0, 42.0, 45.0, 47.0, 50.0] {
        recorder.push_memory_sample(sample);
    }

    c.bench_function("recorder_record_full_window", |b| {
        b.iter(|| recorder.record(&user, Endpoint::Export, black_box(Duration::from_millis(40)), true));
    });
    c.bench_function("recorder_average_response_time", |b| {
        b.iter(|| recorder.average_response_time(&user, black_box(Endpoint::Export)));
    });
    c.bench_function("recorder_memory_trend", |b| {
        b.iter(|| recorder.memory_trend());
    });
}

criterion_group!(governor_benches, bench_resolve, bench_admit_complete, bench_recorder);
criterion_main!(governor_benches);
