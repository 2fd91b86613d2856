pub use criterion::Criterion;

mod shared;

pub fn bench(c: &mut Criterion) {
    shared::bench(c);
}
