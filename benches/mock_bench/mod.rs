pub use criterion::Criterion;

mod alloc_failure;
mod heuristics;

pub fn bench(c: &mut Criterion) {
    alloc_failure::bench(c);
    heuristics::bench(c);
}
