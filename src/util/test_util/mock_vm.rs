// Some mock hooks are only used by some tests.
#![allow(dead_code)]

use super::mock_method::*;
use crate::plan::{GCCause, GenerationType};
use crate::scheduler::controller::{CancelledGC, DegenerationPoint};
use crate::util::constants::BYTES_IN_MBYTE;
use crate::vm::{Collection, ConcurrentOutcome, CycleRequest, DegeneratedOutcome};
use crate::vm::{GenerationUsage, Heap};
use crate::{GCControl, GCControlBuilder};
use std::sync::Arc;
use std::time::Instant;

/// The size of the heap the default mock reports: roomy and empty.
pub const MOCK_HEAP_CAPACITY: usize = 100 * BYTES_IN_MBYTE;

/// The hooks that take the cancellation token store it with an extended lifetime.  The token
/// outlives every call since the controller owns it for as long as the mock is called.
macro_rules! lifetime {
    ($e: expr) => {
        unsafe { std::mem::transmute($e) }
    };
}

/// A runtime whose every hook is a [`MockMethod`].
///
/// Create one with `MockVM { hook: MockMethod::new_fixed(..), ..MockVM::default() }`, share it
/// as an `Arc<MockVM>` for both the heap and the collection, and inspect the call counts
/// afterwards.  The default hooks describe an idle empty heap whose cycles always succeed.
pub struct MockVM {
    pub usage: MockMethod<GenerationType, GenerationUsage>,
    pub requires_humongous: MockMethod<usize, bool>,
    pub cancel_gc: MockMethod<GCCause, ()>,
    pub reset_bytes_allocated_since_gc_start: MockMethod<(), ()>,
    pub report_pacing_allocation: MockMethod<usize, ()>,
    pub soft_max_changed: MockMethod<(), bool>,
    pub maybe_uncommit: MockMethod<(Instant, usize), ()>,
    pub min_capacity: MockMethod<(), usize>,
    pub concurrent_cycle: MockMethod<(CycleRequest, &'static CancelledGC), ConcurrentOutcome>,
    pub degenerated_cycle: MockMethod<(CycleRequest, DegenerationPoint), DegeneratedOutcome>,
    pub full_cycle: MockMethod<CycleRequest, ()>,
    pub concurrent_old_marking: MockMethod<(CycleRequest, &'static CancelledGC), bool>,
    pub coalesce_and_fill: MockMethod<(CycleRequest, &'static CancelledGC), bool>,
}

impl Default for MockVM {
    fn default() -> Self {
        Self {
            usage: MockMethod::new_fixed(Box::new(|_| {
                GenerationUsage::with_capacity(MOCK_HEAP_CAPACITY, 0)
            })),
            requires_humongous: MockMethod::new_default(),
            cancel_gc: MockMethod::new_default(),
            reset_bytes_allocated_since_gc_start: MockMethod::new_default(),
            report_pacing_allocation: MockMethod::new_default(),
            soft_max_changed: MockMethod::new_default(),
            maybe_uncommit: MockMethod::new_default(),
            min_capacity: MockMethod::new_default(),
            concurrent_cycle: MockMethod::new_fixed(Box::new(|_| ConcurrentOutcome::Completed {
                abbreviated: false,
            })),
            degenerated_cycle: MockMethod::new_fixed(Box::new(|_| {
                DegeneratedOutcome::Completed { abbreviated: false }
            })),
            full_cycle: MockMethod::new_default(),
            concurrent_old_marking: MockMethod::new_fixed(Box::new(|_| true)),
            coalesce_and_fill: MockMethod::new_fixed(Box::new(|_| true)),
        }
    }
}

impl Heap for MockVM {
    fn usage(&self, generation: GenerationType) -> GenerationUsage {
        self.usage.call(generation)
    }

    fn requires_humongous(&self, words: usize) -> bool {
        self.requires_humongous.call(words)
    }

    fn cancel_gc(&self, cause: GCCause) {
        self.cancel_gc.call(cause)
    }

    fn reset_bytes_allocated_since_gc_start(&self) {
        self.reset_bytes_allocated_since_gc_start.call(())
    }

    fn report_pacing_allocation(&self, words: usize) {
        self.report_pacing_allocation.call(words)
    }

    fn soft_max_changed(&self) -> bool {
        self.soft_max_changed.call(())
    }

    fn maybe_uncommit(&self, shrink_before: Instant, shrink_until: usize) {
        self.maybe_uncommit.call((shrink_before, shrink_until))
    }

    fn min_capacity(&self) -> usize {
        self.min_capacity.call(())
    }
}

impl Collection for MockVM {
    fn concurrent_cycle(&self, request: &CycleRequest, cancel: &CancelledGC) -> ConcurrentOutcome {
        self.concurrent_cycle.call((*request, lifetime!(cancel)))
    }

    fn degenerated_cycle(
        &self,
        request: &CycleRequest,
        point: DegenerationPoint,
    ) -> DegeneratedOutcome {
        self.degenerated_cycle.call((*request, point))
    }

    fn full_cycle(&self, request: &CycleRequest) {
        self.full_cycle.call(*request)
    }

    fn concurrent_old_marking(&self, request: &CycleRequest, cancel: &CancelledGC) -> bool {
        self.concurrent_old_marking.call((*request, lifetime!(cancel)))
    }

    fn coalesce_and_fill(&self, request: &CycleRequest, cancel: &CancelledGC) -> bool {
        self.coalesce_and_fill.call((*request, lifetime!(cancel)))
    }
}

/// Build a control plane over `mock` with `options` set, and run `test` with it.  The service
/// threads are not started: call `initialize_collection` in the test if it needs them.  They are
/// stopped afterwards, even if the test panics.
pub fn with_mockvm<T>(mock: MockVM, options: &[(&str, &str)], test: T)
where
    T: FnOnce(&Arc<GCControl>, &Arc<MockVM>),
{
    struct StopOnDrop(Arc<GCControl>);
    impl Drop for StopOnDrop {
        fn drop(&mut self) {
            // Fails harmlessly if the test never started the threads.
            let _ = self.0.stop();
        }
    }

    super::serial_test(|| {
        let mock = Arc::new(mock);
        let mut builder = GCControlBuilder::new();
        for (name, val) in options {
            assert!(builder.set_option(name, val), "{}={}", name, val);
        }
        let gc = Arc::new(builder.build(mock.clone(), mock.clone()));
        let guard = StopOnDrop(gc.clone());
        test(&guard.0, &mock);
    })
}
