//! Collector-wide vocabulary: why a cycle runs, which generation it covers, and what happened to
//! the cycles so far.

mod collector_policy;
mod gc_cause;
mod generation;

pub use collector_policy::CollectorPolicy;
pub use gc_cause::GCCause;
pub use generation::GenerationType;
pub use generation::OldGeneration;
pub use generation::OldGenerationState;
