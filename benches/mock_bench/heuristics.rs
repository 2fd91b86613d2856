//! Cost of one regulator poll.

use criterion::Criterion;
use gc_control::util::test_util::mock_vm::*;
use std::hint::black_box;

pub fn bench(c: &mut Criterion) {
    for heuristics in ["adaptive", "static", "compact"] {
        with_mockvm(
            MockVM::default(),
            &[("heuristics", heuristics), ("guaranteed_gc_interval", "0")],
            |gc, _| {
                c.bench_function(&format!("should_start_gc ({})", heuristics), |b| {
                    b.iter(|| black_box(gc.heuristics().global().should_start_gc()))
                });
            },
        );
    }
}
