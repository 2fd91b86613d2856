use crate::plan::{GCCause, GenerationType};
use crate::scheduler::controller::{CancelledGC, DegenerationPoint};

/// Everything the collection phases need to know about the cycle they are running.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CycleRequest {
    /// The id of this cycle, as returned by `get_gc_id()` while it runs.
    pub gc_id: usize,
    pub cause: GCCause,
    pub generation: GenerationType,
    pub unload_classes: bool,
    pub clear_soft_refs: bool,
    /// Objects surviving this cycle get older.
    pub aging: bool,
    /// This young cycle also prepares old marking.
    pub bootstrap_old: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConcurrentOutcome {
    /// The cycle ran to the end.  `abbreviated` if it found enough garbage to skip evacuation
    /// and reference updating.
    Completed { abbreviated: bool },
    /// The cycle observed the cancellation at a safe point and stopped there.
    Cancelled(DegenerationPoint),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DegeneratedOutcome {
    Completed { abbreviated: bool },
    /// Not enough memory was reclaimed.  The control thread follows up with a full GC.
    UpgradeToFull,
}

/// The collection phases.  All of them run on the control thread.
///
/// Concurrent work must poll `cancel.is_cancelled()` at safe points and return early once it is
/// set.  The control plane never interrupts a phase.
pub trait Collection: Send + Sync {
    fn concurrent_cycle(&self, request: &CycleRequest, cancel: &CancelledGC) -> ConcurrentOutcome;

    /// Finish a cancelled cycle with mutators stopped, resuming from `point`.
    fn degenerated_cycle(
        &self,
        request: &CycleRequest,
        point: DegenerationPoint,
    ) -> DegeneratedOutcome;

    /// Collect the whole heap with mutators stopped.
    fn full_cycle(&self, request: &CycleRequest);

    /// Continue old marking.  Returns `true` when marking is complete, `false` if it was cancelled.
    fn concurrent_old_marking(&self, request: &CycleRequest, cancel: &CancelledGC) -> bool;

    /// Coalesce and fill dead old objects.  Returns `true` when complete, `false` if cancelled.
    fn coalesce_and_fill(&self, request: &CycleRequest, cancel: &CancelledGC) -> bool;
}
