//! Benchmarks for the shared flags every mutator touches on its slow paths.

use criterion::Criterion;
use gc_control::plan::GCCause;
use gc_control::util::shared::{SharedBitmap, SharedEnumFlag, SharedFlag};
use std::hint::black_box;

pub fn bench(c: &mut Criterion) {
    let flag = SharedFlag::new();
    c.bench_function("shared_flag_is_set", |b| b.iter(|| black_box(flag.is_set())));

    c.bench_function("shared_flag_try_set", |b| {
        b.iter(|| {
            black_box(flag.try_set());
            flag.unset();
        })
    });

    let bitmap = SharedBitmap::new();
    c.bench_function("shared_bitmap_set_unset", |b| {
        b.iter(|| {
            bitmap.set(black_box(0b0101));
            bitmap.unset(black_box(0b0100));
        })
    });

    let cause = SharedEnumFlag::new(GCCause::NoGc);
    c.bench_function("shared_enum_flag_cmpxchg", |b| {
        b.iter(|| {
            black_box(cause.cmpxchg(GCCause::ConcurrentGc, GCCause::NoGc));
            cause.set(GCCause::NoGc);
        })
    });
}
