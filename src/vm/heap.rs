use crate::plan::{GCCause, GenerationType};
use std::time::Instant;

/// A snapshot of one generation's occupancy, in bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationUsage {
    /// The most this generation may ever grow to.
    pub max_capacity: usize,
    /// The size the heuristics should size their decisions against.
    pub soft_max_capacity: usize,
    pub used: usize,
    /// Free memory against `max_capacity`.
    pub available: usize,
    /// Free memory against `soft_max_capacity`.
    pub soft_available: usize,
    /// Allocated since the start of the last cycle.
    pub bytes_allocated_since_gc_start: usize,
}

impl GenerationUsage {
    /// A generation with `capacity` bytes of which `used` are in use.
    pub fn with_capacity(capacity: usize, used: usize) -> Self {
        let available = capacity.saturating_sub(used);
        Self {
            max_capacity: capacity,
            soft_max_capacity: capacity,
            used,
            available,
            soft_available: available,
            bytes_allocated_since_gc_start: 0,
        }
    }
}

/// Heap accounting queries and notifications.
pub trait Heap: Send + Sync {
    /// Current occupancy of `generation`.  `GenerationType::NonGen` and `GenerationType::Global`
    /// both describe the whole heap.
    fn usage(&self, generation: GenerationType) -> GenerationUsage;

    /// Would an allocation of `words` need a humongous (multi-region) allocation?
    fn requires_humongous(&self, words: usize) -> bool {
        let _ = words;
        false
    }

    /// The in-flight cycle has just been cancelled.  Called at most once per cancellation, by the
    /// thread that won it.
    fn cancel_gc(&self, cause: GCCause);

    /// A new cycle is starting.
    fn reset_bytes_allocated_since_gc_start(&self) {}

    /// Words allocated by mutators since the control thread last looked.
    fn report_pacing_allocation(&self, words: usize) {
        let _ = words;
    }

    /// Has the soft maximum heap size changed since the last call?
    fn soft_max_changed(&self) -> bool {
        false
    }

    /// Uncommit regions that have been empty since before `shrink_before`, but do not shrink the
    /// committed heap below `shrink_until` bytes.
    fn maybe_uncommit(&self, shrink_before: Instant, shrink_until: usize) {
        let _ = (shrink_before, shrink_until);
    }

    /// The committed size the heap never shrinks below, in bytes.
    fn min_capacity(&self) -> usize {
        0
    }
}
