//! Mutator-side cost of reporting allocation failures.

use criterion::Criterion;
use gc_control::util::test_util::mock_vm::*;
use gc_control::util::AllocRequest;
use std::hint::black_box;

pub fn bench(c: &mut Criterion) {
    with_mockvm(MockVM::default(), &[], |gc, _| {
        let req = AllocRequest::for_tlab(256);

        // Only the first failure of an episode cancels the cycle.  Every later one is a flag check.
        gc.handle_alloc_failure(&req, false);
        c.bench_function("handle_alloc_failure (pending)", |b| {
            b.iter(|| gc.handle_alloc_failure(black_box(&req), false))
        });

        c.bench_function("handle_alloc_failure (episode)", |b| {
            b.iter(|| {
                gc.handle_alloc_failure(black_box(&req), false);
                gc.controller().notify_alloc_failure_waiters();
                gc.controller().cancelled_gc().clear();
            })
        });

        c.bench_function("pacing_notify_alloc", |b| {
            b.iter(|| gc.pacing_notify_alloc(black_box(64)))
        });
    });
}
