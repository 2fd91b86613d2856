//! The interface the runtime implements for the control plane.
//!
//! The control plane decides *when* and *what kind* of collection runs.  Everything else is the
//! runtime's: heap accounting lives behind [`Heap`], and the collection phases themselves
//! (marking, evacuation, reference updating, compaction) run behind [`Collection`].
//! Both are object-safe and shared between the control thread, the regulator and mutators, so
//! implementations must be `Send + Sync`.

mod collection;
mod heap;

pub use self::collection::Collection;
pub use self::collection::ConcurrentOutcome;
pub use self::collection::CycleRequest;
pub use self::collection::DegeneratedOutcome;
pub use self::heap::GenerationUsage;
pub use self::heap::Heap;
