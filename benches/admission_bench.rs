//! Benchmarks for the provisioning and admission hot paths.
//!
//! Benchmarks cover:
//! - Parameter resolution (blocking and non-blocking attribute sets)
//! - Direct hand-off admission on a warm pool
//! - Delegation to a hand-off executor on a saturated pool

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use crossbeam_channel::bounded;
use queueless_pool::builders::resolver;
use queueless_pool::config::AddRequest;
use queueless_pool::core::{
    AdmissionPolicy, HandoffExecutor, HandoffRejected, NamedThreadFactory, QueuelessPool, Task,
};

fn sample_request() -> AddRequest {
    AddRequest::from_json_str(
        r#"{
            "address": ["worker-pools", "bench"],
            "attributes": {"max-threads": 8, "keepalive-time": 1000}
        }"#,
    )
    .expect("valid json")
}

fn warm_pool(policy: AdmissionPolicy) -> Arc<QueuelessPool> {
    let pool = Arc::new(
        QueuelessPool::new("bench", 8, Duration::from_secs(5), policy).expect("bound"),
    );
    pool.bind_thread_factory(Arc::new(NamedThreadFactory::new("bench")))
        .expect("bind factory");
    pool
}

/// Hand-off executor that drops every task; isolates the delegation path.
struct NullHandoff;

impl HandoffExecutor for NullHandoff {
    fn execute(&self, _task: Task) -> Result<(), HandoffRejected> {
        Ok(())
    }
}

fn bench_resolve(c: &mut Criterion) {
    let request = sample_request();
    c.bench_function("resolve_blocking", |b| {
        b.iter(|| resolver::resolve(black_box(&request), true).expect("valid request"));
    });
    c.bench_function("resolve_non_blocking", |b| {
        b.iter(|| resolver::resolve(black_box(&request), false).expect("valid request"));
    });
}

fn bench_admission(c: &mut Criterion) {
    let pool = warm_pool(AdmissionPolicy::Block);
    pool.start().expect("start");
    c.bench_function("submit_empty_task", |b| {
        b.iter(|| pool.submit(|| {}).expect("blocking pool never rejects"));
    });
    pool.stop();
}

fn bench_delegation(c: &mut Criterion) {
    let pool = Arc::new(
        QueuelessPool::new(
            "bench-delegate",
            1,
            Duration::from_secs(60),
            AdmissionPolicy::DelegateOrReject,
        )
        .expect("bound"),
    );
    pool.bind_thread_factory(Arc::new(NamedThreadFactory::new("bench-delegate")))
        .expect("bind factory");
    pool.bind_handoff_executor(Arc::new(NullHandoff))
        .expect("bind hand-off");
    pool.start().expect("start");

    // Occupy the single worker so every submission takes the delegate path.
    let (gate_tx, gate_rx) = bounded::<()>(0);
    pool.submit(move || {
        let _ = gate_rx.recv();
    })
    .expect("capacity available");

    c.bench_function("submit_delegated", |b| {
        b.iter(|| pool.submit(|| {}).expect("delegation accepts"));
    });

    drop(gate_tx);
    pool.stop();
}

criterion_group!(benches, bench_resolve, bench_admission, bench_delegation);
criterion_main!(benches);
