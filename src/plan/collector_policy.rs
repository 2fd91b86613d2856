//! Counters of how cycles were started and how they ended.
//!
//! Only the control thread records outcomes; anyone may read them.  The counters are statistics,
//! so relaxed ordering is enough.

use crate::plan::GCCause;
use crate::scheduler::controller::DegenerationPoint;
use enum_map::{Enum, EnumMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub struct CollectorPolicy {
    success_concurrent_gcs: AtomicUsize,
    success_young_concurrent_gcs: AtomicUsize,
    abbreviated_concurrent_gcs: AtomicUsize,
    success_degenerated_gcs: AtomicUsize,
    success_young_degenerated_gcs: AtomicUsize,
    abbreviated_degenerated_gcs: AtomicUsize,
    success_full_gcs: AtomicUsize,
    success_old_gcs: AtomicUsize,
    interrupted_old_gcs: AtomicUsize,
    alloc_failure_degenerated: AtomicUsize,
    alloc_failure_degenerated_upgrade_to_full: AtomicUsize,
    alloc_failure_full: AtomicUsize,
    explicit_concurrent: AtomicUsize,
    explicit_full: AtomicUsize,
    implicit_concurrent: AtomicUsize,
    implicit_full: AtomicUsize,
    /// Degenerated cycles since the last concurrent or full success.
    consecutive_degenerated_gcs: AtomicUsize,
    cycle_counter: AtomicUsize,
    degen_points: EnumMap<DegenerationPoint, AtomicUsize>,
    collection_causes: EnumMap<GCCause, AtomicUsize>,
    in_shutdown: AtomicBool,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl CollectorPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_collection_cause(&self, cause: GCCause) {
        bump(&self.collection_causes[cause]);
    }

    pub fn record_cycle_start(&self) {
        bump(&self.cycle_counter);
    }

    pub fn record_success_concurrent(&self, is_young: bool, abbreviated: bool) {
        self.consecutive_degenerated_gcs.store(0, Ordering::Relaxed);
        bump(&self.success_concurrent_gcs);
        if is_young {
            bump(&self.success_young_concurrent_gcs);
        }
        if abbreviated {
            bump(&self.abbreviated_concurrent_gcs);
        }
    }

    pub fn record_success_old(&self) {
        bump(&self.success_old_gcs);
    }

    pub fn record_interrupted_old(&self) {
        bump(&self.interrupted_old_gcs);
    }

    pub fn record_alloc_failure_to_degenerated(&self, point: DegenerationPoint) {
        assert!(point != DegenerationPoint::Unset);
        bump(&self.alloc_failure_degenerated);
        bump(&self.degen_points[point]);
    }

    pub fn record_alloc_failure_to_full(&self) {
        bump(&self.alloc_failure_full);
    }

    pub fn record_degenerated_upgrade_to_full(&self) {
        self.consecutive_degenerated_gcs.store(0, Ordering::Relaxed);
        bump(&self.alloc_failure_degenerated_upgrade_to_full);
    }

    pub fn record_success_degenerated(&self, is_young: bool, abbreviated: bool) {
        bump(&self.success_degenerated_gcs);
        if is_young {
            bump(&self.success_young_degenerated_gcs);
        }
        bump(&self.consecutive_degenerated_gcs);
        if abbreviated {
            bump(&self.abbreviated_degenerated_gcs);
        }
    }

    pub fn record_success_full(&self) {
        self.consecutive_degenerated_gcs.store(0, Ordering::Relaxed);
        bump(&self.success_full_gcs);
    }

    pub fn record_explicit_to_concurrent(&self) {
        bump(&self.explicit_concurrent);
    }

    pub fn record_explicit_to_full(&self) {
        bump(&self.explicit_full);
    }

    pub fn record_implicit_to_concurrent(&self) {
        bump(&self.implicit_concurrent);
    }

    pub fn record_implicit_to_full(&self) {
        bump(&self.implicit_full);
    }

    pub fn record_shutdown(&self) {
        self.in_shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_at_shutdown(&self) -> bool {
        self.in_shutdown.load(Ordering::Relaxed)
    }

    pub fn cycle_counter(&self) -> usize {
        self.cycle_counter.load(Ordering::Relaxed)
    }

    pub fn consecutive_degenerated_gcs(&self) -> usize {
        self.consecutive_degenerated_gcs.load(Ordering::Relaxed)
    }

    pub fn success_concurrent_gcs(&self) -> usize {
        self.success_concurrent_gcs.load(Ordering::Relaxed)
    }

    pub fn success_degenerated_gcs(&self) -> usize {
        self.success_degenerated_gcs.load(Ordering::Relaxed)
    }

    pub fn success_full_gcs(&self) -> usize {
        self.success_full_gcs.load(Ordering::Relaxed)
    }

    pub fn success_old_gcs(&self) -> usize {
        self.success_old_gcs.load(Ordering::Relaxed)
    }

    pub fn interrupted_old_gcs(&self) -> usize {
        self.interrupted_old_gcs.load(Ordering::Relaxed)
    }

    pub fn alloc_failure_degenerated(&self) -> usize {
        self.alloc_failure_degenerated.load(Ordering::Relaxed)
    }

    pub fn alloc_failure_full(&self) -> usize {
        self.alloc_failure_full.load(Ordering::Relaxed)
    }

    pub fn degenerated_upgrade_to_full(&self) -> usize {
        self.alloc_failure_degenerated_upgrade_to_full
            .load(Ordering::Relaxed)
    }

    pub fn degenerated_at(&self, point: DegenerationPoint) -> usize {
        self.degen_points[point].load(Ordering::Relaxed)
    }

    pub fn collections_caused_by(&self, cause: GCCause) -> usize {
        self.collection_causes[cause].load(Ordering::Relaxed)
    }

    /// Log a summary of every cycle so far.
    pub fn print_gc_stats(&self) {
        let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        info!(
            "Under allocation pressure, concurrent cycles may cancel, and either continue cycle \
             under stop-the-world pause or result in stop-the-world Full GC."
        );
        info!(
            "{:5} Completed Concurrent GCs ({} young, {} abbreviated)",
            load(&self.success_concurrent_gcs),
            load(&self.success_young_concurrent_gcs),
            load(&self.abbreviated_concurrent_gcs)
        );
        info!(
            "{:5} Completed Old GCs ({} interruptions)",
            load(&self.success_old_gcs),
            load(&self.interrupted_old_gcs)
        );
        info!(
            "{:5} Degenerated GCs ({} young, {} abbreviated)",
            load(&self.success_degenerated_gcs),
            load(&self.success_young_degenerated_gcs),
            load(&self.abbreviated_degenerated_gcs)
        );
        info!(
            "{:5} caused by allocation failure",
            load(&self.alloc_failure_degenerated)
        );
        for index in 0..DegenerationPoint::LENGTH {
            let point = DegenerationPoint::from_usize(index);
            let count = load(&self.degen_points[point]);
            if count > 0 {
                info!("  {:5} happened at {}", count, point);
            }
        }
        info!(
            "{:5} upgraded to Full GC",
            load(&self.alloc_failure_degenerated_upgrade_to_full)
        );
        info!(
            "{:5} Full GCs ({} caused by allocation failure)",
            load(&self.success_full_gcs),
            load(&self.alloc_failure_full)
        );
        info!(
            "{:5} explicit requests ({} concurrent, {} full)",
            load(&self.explicit_concurrent) + load(&self.explicit_full),
            load(&self.explicit_concurrent),
            load(&self.explicit_full)
        );
        info!(
            "{:5} implicit requests ({} concurrent, {} full)",
            load(&self.implicit_concurrent) + load(&self.implicit_full),
            load(&self.implicit_concurrent),
            load(&self.implicit_full)
        );
        for (cause, count) in self.collection_causes.iter() {
            let count = load(count);
            if count > 0 {
                info!("  {:5} caused by {}", count, cause);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_degenerated_resets_on_success() {
        let policy = CollectorPolicy::new();
        policy.record_success_degenerated(true, false);
        policy.record_success_degenerated(false, false);
        assert_eq!(policy.consecutive_degenerated_gcs(), 2);
        policy.record_success_concurrent(true, false);
        assert_eq!(policy.consecutive_degenerated_gcs(), 0);
        policy.record_success_degenerated(true, false);
        policy.record_success_full();
        assert_eq!(policy.consecutive_degenerated_gcs(), 0);
        assert_eq!(policy.success_degenerated_gcs(), 3);
        assert_eq!(policy.success_full_gcs(), 1);
    }

    #[test]
    fn degeneration_points_histogram() {
        let policy = CollectorPolicy::new();
        policy.record_alloc_failure_to_degenerated(DegenerationPoint::Mark);
        policy.record_alloc_failure_to_degenerated(DegenerationPoint::Mark);
        policy.record_alloc_failure_to_degenerated(DegenerationPoint::Evac);
        assert_eq!(policy.alloc_failure_degenerated(), 3);
        assert_eq!(policy.degenerated_at(DegenerationPoint::Mark), 2);
        assert_eq!(policy.degenerated_at(DegenerationPoint::Evac), 1);
        assert_eq!(policy.degenerated_at(DegenerationPoint::UpdateRefs), 0);
    }

    #[test]
    #[should_panic]
    fn unset_degeneration_point_is_rejected() {
        let policy = CollectorPolicy::new();
        policy.record_alloc_failure_to_degenerated(DegenerationPoint::Unset);
    }

    #[test]
    fn causes_are_counted() {
        let policy = CollectorPolicy::new();
        policy.record_collection_cause(GCCause::AllocationFailure);
        policy.record_collection_cause(GCCause::ConcurrentGc);
        policy.record_collection_cause(GCCause::ConcurrentGc);
        assert_eq!(policy.collections_caused_by(GCCause::ConcurrentGc), 2);
        assert_eq!(policy.collections_caused_by(GCCause::JavaLangSystemGc), 0);
        policy.print_gc_stats();
    }
}
