//! The control thread and its cycle state machine.
//!
//! One thread runs [`Controller::run_service`].  Each iteration it looks at what was signalled
//! since the last one (an allocation failure, a requested collection, a request from the
//! regulator, unfinished old work), picks a [`GCMode`] and runs the corresponding cycle through
//! the runtime's [`Collection`].  Mutators and the regulator never change the mode: they set
//! request flags, wake the control thread and, if they need to, wait on a monitor for it.

use crate::heuristics::HeuristicsSet;
use crate::plan::{CollectorPolicy, GCCause, GenerationType, OldGeneration, OldGenerationState};
use crate::util::alloc_request::AllocRequest;
use crate::util::conversions::{bytes_to_formatted_string, words_to_bytes};
use crate::util::error::{GCControlError, GCControlResult};
use crate::util::monitor::Monitor;
use crate::util::options::Options;
use crate::util::shared::{SharedEnumFlag, SharedFlag};
use crate::vm::{Collection, ConcurrentOutcome, CycleRequest, DegeneratedOutcome, Heap};
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

mod cancellation;
mod mode;

pub use self::cancellation::CancelledGC;
pub use self::mode::{DegenerationPoint, GCMode};

pub struct Controller {
    options: Arc<Options>,
    heap: Arc<dyn Heap>,
    collection: Arc<dyn Collection>,
    heuristics: Arc<HeuristicsSet>,
    old_generation: Arc<OldGeneration>,
    policy: CollectorPolicy,

    mode: SharedEnumFlag<GCMode>,
    /// Bumped on every mode change, so that a waiter cannot miss a change that is undone before
    /// it looks at the mode again.
    mode_epoch: AtomicUsize,

    /// The pending request.  `GCCause::NoGc` when there is none.
    requested_gc_cause: SharedEnumFlag<GCCause>,
    /// The generation of a pending `GCCause::ConcurrentGc` request.  Written before the cause.
    requested_generation: SharedEnumFlag<GenerationType>,
    degen_point: SharedEnumFlag<DegenerationPoint>,
    /// The generation whose concurrent cycle was cancelled at `degen_point`.
    degen_generation: SharedEnumFlag<GenerationType>,
    cancelled_gc: CachePadded<CancelledGC>,

    alloc_failure_gc: CachePadded<SharedFlag>,
    humongous_alloc_failure_gc: SharedFlag,
    graceful_shutdown: SharedFlag,
    should_terminate: SharedFlag,
    /// A young request is interrupting old work.
    preemption_requested: SharedFlag,
    /// Set while old marking or filling runs and may be interrupted.
    allow_old_preemption: SharedFlag,

    /// Words allocated since the control thread last looked.  Approximate.
    allocs_seen: CachePadded<AtomicUsize>,
    gc_id: AtomicUsize,

    alloc_failure_waiters: Monitor,
    gc_waiters: Monitor,
    /// Where the control thread idles.
    control_lock: Monitor,
    /// Where the regulator waits for the control thread to pick up its request.
    regulator_lock: Monitor,
}

impl Controller {
    pub fn new(
        options: Arc<Options>,
        heap: Arc<dyn Heap>,
        collection: Arc<dyn Collection>,
        heuristics: Arc<HeuristicsSet>,
        old_generation: Arc<OldGeneration>,
    ) -> Self {
        let global_generation = heuristics.global_generation();
        Self {
            options,
            heap,
            collection,
            heuristics,
            old_generation,
            policy: CollectorPolicy::new(),
            mode: SharedEnumFlag::new(GCMode::None),
            mode_epoch: AtomicUsize::new(0),
            requested_gc_cause: SharedEnumFlag::new(GCCause::NoGc),
            requested_generation: SharedEnumFlag::new(global_generation),
            degen_point: SharedEnumFlag::new(DegenerationPoint::OutsideCycle),
            degen_generation: SharedEnumFlag::new(global_generation),
            cancelled_gc: CachePadded::new(CancelledGC::new()),
            alloc_failure_gc: CachePadded::new(SharedFlag::new()),
            humongous_alloc_failure_gc: SharedFlag::new(),
            graceful_shutdown: SharedFlag::new(),
            should_terminate: SharedFlag::new(),
            preemption_requested: SharedFlag::new(),
            allow_old_preemption: SharedFlag::new(),
            allocs_seen: CachePadded::new(AtomicUsize::new(0)),
            gc_id: AtomicUsize::new(0),
            alloc_failure_waiters: Monitor::new(),
            gc_waiters: Monitor::new(),
            control_lock: Monitor::new(),
            regulator_lock: Monitor::new(),
        }
    }

    /// Spawn the control thread.
    pub fn spawn(self: &Arc<Self>) -> GCControlResult<JoinHandle<()>> {
        let controller = self.clone();
        std::thread::Builder::new()
            .name("GC Control Thread".to_string())
            .spawn(move || controller.run_service())
            .map_err(|source| GCControlError::SpawnThread {
                name: "control",
                source,
            })
    }

    /// The control loop.  Returns once `stop_service` has been called.
    pub fn run_service(&self) {
        let global_generation = self.heuristics.global_generation();
        let mut age_period = 0;
        let mut last_shrink_time = Instant::now();
        // Shrink period avoids constantly polling regions for shrinking.  Having a period 10x
        // lower than the delay would mean we hit the shrinking with lag of less than 1/10-th of
        // the true delay.
        let shrink_period = Duration::from_millis((self.options.uncommit_delay / 10).max(1));
        let idle_wait = Duration::from_millis(self.options.control_interval_max);

        info!(
            "Control thread started with {} heuristics",
            self.heuristics.global().name()
        );

        while !self.in_graceful_shutdown() && !self.should_terminate() {
            // Figure out if we have pending requests.
            let alloc_failure_pending = self.alloc_failure_gc.is_set();
            let humongous_alloc_failure_pending = self.humongous_alloc_failure_gc.is_set();
            let allocs_seen = self.reset_allocs_seen();
            let soft_max_changed = self.heap.soft_max_changed();

            self.set_gc_mode(GCMode::None);

            let mut mode = GCMode::None;
            let mut generation = global_generation;
            let mut degen_point = DegenerationPoint::Unset;

            // A degenerated or full cycle supersedes a concurrent request from the regulator.
            // Any other request stays posted for the next iteration, so its requester is served.
            let mut cause = if alloc_failure_pending {
                self.requested_gc_cause
                    .cmpxchg(GCCause::NoGc, GCCause::ConcurrentGc);
                GCCause::AllocationFailure
            } else {
                self.requested_gc_cause.xchg(GCCause::NoGc)
            };
            let requested_generation = self.requested_generation.get();

            if alloc_failure_pending {
                // Allocation failure takes precedence: we have to deal with it first thing.
                degen_point = self.degen_point.xchg(DegenerationPoint::OutsideCycle);
                if degen_point == DegenerationPoint::OutsideCycle {
                    self.degen_generation.set(if self.heuristics.is_generational() {
                        GenerationType::Young
                    } else {
                        global_generation
                    });
                }
                let degen_generation = self.degen_generation.get();
                let heuristics = self.heuristics.get(degen_generation);
                heuristics.log_trigger("Handle Allocation Failure");
                heuristics.record_allocation_failure_gc();

                // Consider degenerated GC first, if allowed.  Humongous allocations need
                // contiguous space that only a full GC is guaranteed to produce.
                if self.options.degenerated_gc
                    && heuristics.should_degenerate_cycle()
                    && !humongous_alloc_failure_pending
                {
                    self.policy.record_alloc_failure_to_degenerated(degen_point);
                    mode = GCMode::StwDegenerated;
                    generation = degen_generation;
                } else {
                    self.policy.record_alloc_failure_to_full();
                    mode = GCMode::StwFull;
                }
            } else if cause.is_requested() {
                let global = self.heuristics.global();
                global.log_trigger(&format!("GC request ({})", cause));
                global.record_requested_gc();
                if cause.should_run_full(&self.options) {
                    if cause.is_explicit() {
                        self.policy.record_explicit_to_full();
                    } else {
                        self.policy.record_implicit_to_full();
                    }
                    mode = GCMode::StwFull;
                } else {
                    if cause.is_explicit() {
                        self.policy.record_explicit_to_concurrent();
                    } else {
                        self.policy.record_implicit_to_concurrent();
                    }
                    mode = GCMode::ConcurrentNormal;
                }
            } else if cause == GCCause::ConcurrentGc {
                generation = requested_generation;
                mode = GCMode::ConcurrentNormal;
                if generation.is_old() {
                    match self.old_generation.state() {
                        OldGenerationState::WaitingForBootstrap
                        | OldGenerationState::Bootstrapping => mode = GCMode::BootstrappingOld,
                        OldGenerationState::Marking => mode = GCMode::ServicingOld,
                        // Old is only being filled; the heap still needs a young collection.
                        OldGenerationState::Filling => generation = GenerationType::Young,
                    }
                }
            } else if self.heuristics.is_generational() && self.old_generation.has_unfinished_work()
            {
                info!("Resume old GC in state {}", self.old_generation.state());
                cause = GCCause::ConcurrentGc;
                generation = GenerationType::Old;
                mode = GCMode::ServicingOld;
            }

            let gc_requested = mode != GCMode::None;
            if gc_requested {
                let is_global = generation.is_global();
                let unload_classes = if mode == GCMode::StwFull || cause.is_requested() {
                    self.heuristics.global().can_unload_classes()
                } else {
                    is_global
                        && self
                            .heuristics
                            .get(generation)
                            .should_unload_classes(self.policy.cycle_counter())
                };
                let clear_soft_refs = self.options.always_clear_soft_refs
                    || ((alloc_failure_pending || cause.is_requested())
                        && (is_global || mode == GCMode::StwFull));

                let aging = match mode {
                    GCMode::ConcurrentNormal | GCMode::StwFull => {
                        if age_period == 0 {
                            age_period = self.options.aging_cycle_period;
                        }
                        age_period -= 1;
                        age_period == 0
                    }
                    _ => false,
                };

                self.update_gc_id();
                self.heap.reset_bytes_allocated_since_gc_start();
                self.policy.record_cycle_start();
                self.policy.record_collection_cause(cause);

                let request = CycleRequest {
                    gc_id: self.get_gc_id(),
                    cause,
                    generation: if mode == GCMode::StwFull {
                        global_generation
                    } else {
                        generation
                    },
                    unload_classes,
                    clear_soft_refs,
                    aging,
                    bootstrap_old: false,
                };
                probe!(gc_control, cycle_start, request.gc_id);
                match mode {
                    GCMode::ConcurrentNormal => self.service_concurrent_normal_cycle(&request),
                    GCMode::StwDegenerated => {
                        self.service_stw_degenerated_cycle(&request, degen_point)
                    }
                    GCMode::StwFull => self.service_stw_full_cycle(&request),
                    GCMode::BootstrappingOld | GCMode::ServicingOld => {
                        self.service_concurrent_old_cycle(&request)
                    }
                    GCMode::None | GCMode::Stopped => unreachable!(),
                }
                probe!(gc_control, cycle_end, request.gc_id);

                // If this was the requested GC cycle, notify waiters about it.
                if cause.is_requested() {
                    self.notify_gc_waiters();
                }
                // If this cycle completed because of an allocation failure, notify waiters.
                if alloc_failure_pending {
                    self.notify_alloc_failure_waiters();
                }
                if unload_classes {
                    self.heuristics.global().clear_metaspace_oom();
                }
            } else {
                // Report the allocations the pacer saw while idle.
                self.heap.report_pacing_allocation(allocs_seen);
            }

            let current = Instant::now();
            if self.options.uncommit
                && (cause.is_requested()
                    || soft_max_changed
                    || current.duration_since(last_shrink_time) > shrink_period)
            {
                // Explicit GC tries to uncommit everything down to min capacity.  Soft max
                // change tries to uncommit everything down to target capacity.  Periodic
                // uncommit tries to uncommit suitable regions down to min capacity.
                let shrink_before = if cause.is_requested() || soft_max_changed {
                    current
                } else {
                    current
                        .checked_sub(Duration::from_millis(self.options.uncommit_delay))
                        .unwrap_or(current)
                };
                let shrink_until = if soft_max_changed {
                    self.heap.usage(global_generation).soft_max_capacity
                } else {
                    self.heap.min_capacity()
                };
                self.heap.maybe_uncommit(shrink_before, shrink_until);
                last_shrink_time = current;
            }

            // Wait for a request, or for the next time to look at the heap.  Do not wait when
            // there is already something to do.
            self.control_lock.wait_while_timeout(idle_wait, || {
                !self.is_alloc_failure_gc()
                    && self.requested_gc_cause.get() == GCCause::NoGc
                    && !self.should_terminate()
                    && !self.in_graceful_shutdown()
            });
        }

        self.set_gc_mode(GCMode::Stopped);
        // Wait for the actual stop().  The thread must not exit earlier.
        self.control_lock.wait_while(|| !self.should_terminate());
        debug!("Control thread exits");
    }

    fn service_concurrent_normal_cycle(&self, request: &CycleRequest) {
        self.set_gc_mode(GCMode::ConcurrentNormal);
        self.service_concurrent_cycle(request);
    }

    /// Run a concurrent cycle.  If it is cancelled, remember where so that the next iteration
    /// degenerates from there.
    fn service_concurrent_cycle(&self, request: &CycleRequest) {
        // Normal cycle goes via all concurrent phases.  If allocation failure (af) happens during
        // any of the concurrent phases, it first degrades to Degenerated GC and completes GC
        // there.  If second allocation failure happens during Degenerated GC cycle (for example,
        // when GC tries to evac something and no memory is available), cycle degrades to Full
        // GC.
        //
        // There are also a shortcut through the normal cycle: immediate garbage shortcut, when
        // heuristics says there are no regions to compact, and all the collection comes from
        // immediately reclaimable regions.  The runtime reports it as an abbreviated cycle.
        if self.check_cancellation_or_degen(DegenerationPoint::OutsideCycle) {
            return;
        }

        let generation = request.generation;
        let heuristics = self.heuristics.get(generation);
        heuristics.record_cycle_start();

        match self
            .collection
            .concurrent_cycle(request, &self.cancelled_gc)
        {
            ConcurrentOutcome::Completed { abbreviated } => {
                heuristics.record_success_concurrent();
                self.policy
                    .record_success_concurrent(generation.is_young(), abbreviated);
            }
            ConcurrentOutcome::Cancelled(point) => {
                debug_assert_ne!(point, DegenerationPoint::Unset);
                if self.check_cancellation_or_degen(point) {
                    self.degen_generation.set(generation);
                } else {
                    warn!(
                        "Concurrent {} cycle stopped at {} without being cancelled",
                        generation, point
                    );
                }
            }
        }
        heuristics.record_cycle_end();
    }

    fn service_concurrent_old_cycle(&self, request: &CycleRequest) {
        let state = self.old_generation.state();
        debug!("Service old cycle in state {}", state);
        match state {
            OldGenerationState::Filling => {
                self.set_gc_mode(GCMode::ServicingOld);
                let fill_request = CycleRequest {
                    generation: GenerationType::Old,
                    ..*request
                };
                self.allow_old_preemption.set();
                let complete = self
                    .collection
                    .coalesce_and_fill(&fill_request, &self.cancelled_gc);
                self.allow_old_preemption.unset();
                if complete {
                    self.old_generation
                        .transition_to(OldGenerationState::WaitingForBootstrap);
                    self.consume_late_preemption();
                } else if self.check_cancellation_or_degen(DegenerationPoint::OutsideCycle) {
                    info!("Coalesce and fill of old generation was interrupted");
                }
            }
            OldGenerationState::WaitingForBootstrap | OldGenerationState::Bootstrapping => {
                if state == OldGenerationState::WaitingForBootstrap {
                    self.old_generation
                        .transition_to(OldGenerationState::Bootstrapping);
                }
                self.set_gc_mode(GCMode::BootstrappingOld);
                // The bootstrap is a young cycle that also prepares old marking.
                let young_request = CycleRequest {
                    generation: GenerationType::Young,
                    bootstrap_old: true,
                    ..*request
                };
                self.service_concurrent_cycle(&young_request);
                if self.cancelled_gc.is_cancelled() {
                    // An allocation failure will degenerate the young cycle, which completes the
                    // bootstrap.
                    info!("Bootstrap cycle for old generation was cancelled");
                    return;
                }
                // Normally this happens at the top of the control loop, but a young cycle has
                // just completed and bootstrapped old marking.
                self.degen_point.set(DegenerationPoint::OutsideCycle);
                self.old_generation
                    .transition_to(OldGenerationState::Marking);
                self.service_old_marking(request);
            }
            OldGenerationState::Marking => self.service_old_marking(request),
        }
    }

    fn service_old_marking(&self, request: &CycleRequest) {
        self.set_gc_mode(GCMode::ServicingOld);
        let old_request = CycleRequest {
            generation: GenerationType::Old,
            bootstrap_old: false,
            ..*request
        };
        let old_heuristics = self.heuristics.get(GenerationType::Old);
        old_heuristics.record_cycle_start();

        self.allow_old_preemption.set();
        let complete = self
            .collection
            .concurrent_old_marking(&old_request, &self.cancelled_gc);
        self.allow_old_preemption.unset();

        if complete {
            self.old_generation
                .transition_to(OldGenerationState::Filling);
            self.old_generation
                .set_live_bytes_after_last_mark(self.heap.usage(GenerationType::Old).used);
            old_heuristics.record_success_concurrent();
            self.policy.record_success_old();
            self.consume_late_preemption();
            info!("Old marking complete");
        } else {
            let preempted = self.preemption_requested.is_set();
            if self.check_cancellation_or_degen(DegenerationPoint::OutsideCycle) && preempted {
                self.policy.record_interrupted_old();
                info!("Old marking was preempted by a young collection");
            }
        }
        old_heuristics.record_cycle_end();
    }

    /// A young request may win `allow_old_preemption` just as old work completes.  The old work
    /// is done, so only the young cycle it asked for has to run.
    fn consume_late_preemption(&self) {
        if self.preemption_requested.try_unset() {
            self.cancelled_gc.clear();
        }
    }

    fn service_stw_degenerated_cycle(&self, request: &CycleRequest, point: DegenerationPoint) {
        assert!(
            point != DegenerationPoint::Unset,
            "Degenerated point should be set"
        );
        self.set_gc_mode(GCMode::StwDegenerated);
        self.cancelled_gc.clear();

        let generation = request.generation;
        let heuristics = self.heuristics.get(generation);
        info!("Degenerated {} GC at {}", generation, point);
        match self.collection.degenerated_cycle(request, point) {
            DegeneratedOutcome::Completed { abbreviated } => {
                heuristics.record_degenerated();
                self.policy
                    .record_success_degenerated(generation.is_young(), abbreviated);
                if generation.is_young() && self.old_generation.is_bootstrapping() {
                    // The degenerated young cycle finished the bootstrap.
                    self.old_generation
                        .transition_to(OldGenerationState::Marking);
                }
                heuristics.record_cycle_end();
            }
            DegeneratedOutcome::UpgradeToFull => {
                info!("Degenerated GC upgrading to Full GC");
                self.policy.record_degenerated_upgrade_to_full();
                let full_request = CycleRequest {
                    cause: GCCause::UpgradeToFullGc,
                    generation: self.heuristics.global_generation(),
                    unload_classes: self.heuristics.global().can_unload_classes(),
                    clear_soft_refs: true,
                    ..*request
                };
                self.run_full_cycle(&full_request);
            }
        }
    }

    fn service_stw_full_cycle(&self, request: &CycleRequest) {
        self.set_gc_mode(GCMode::StwFull);
        self.run_full_cycle(request);
    }

    fn run_full_cycle(&self, request: &CycleRequest) {
        self.cancelled_gc.clear();
        let global = self.heuristics.global();
        global.record_cycle_start();
        self.collection.full_cycle(request);
        global.record_success_full();
        if let Some(young) = self.heuristics.young() {
            young.record_success_full();
        }
        self.policy.record_success_full();
        // Whatever old work was in flight, the full GC did it.
        self.old_generation.abandon();
        global.record_cycle_end();
    }

    /// Decide what to do about a cancelled cycle.  Returns `true` if the cycle was cancelled and
    /// the caller should stop it.
    fn check_cancellation_or_degen(&self, point: DegenerationPoint) -> bool {
        if !self.cancelled_gc.is_cancelled() {
            return false;
        }
        if self.in_graceful_shutdown() {
            return true;
        }
        if self.is_alloc_failure_gc() {
            self.degen_point.set(point);
            self.preemption_requested.unset();
            return true;
        }
        if self.preemption_requested.try_unset() {
            // Only old work is preemptible, and an old cycle cancelled for an allocation
            // failure does not get here.
            self.degen_point.set(point);
            self.cancelled_gc.clear();
            return true;
        }
        // The allocation failure that cancelled the cycle has been handled already.
        warn!(
            "GC cancelled ({}) without a pending allocation failure or preemption",
            self.cancelled_gc.cause()
        );
        self.cancelled_gc.clear();
        true
    }

    /// Only the control thread changes the mode.
    fn set_gc_mode(&self, new_mode: GCMode) {
        let old_mode = self.mode.get();
        if old_mode != new_mode {
            debug!("Transition from: {} to: {}", old_mode, new_mode);
            self.mode.set(new_mode);
            self.mode_epoch.fetch_add(1, Ordering::AcqRel);
            self.regulator_lock.notify_all();
        }
    }

    pub fn gc_mode(&self) -> GCMode {
        self.mode.get()
    }

    /// A mutator failed to allocate `req`.  The first failure of an episode cancels the cycle in
    /// flight and wakes the control thread.  With `block`, wait until a cycle has run.
    pub fn handle_alloc_failure(&self, req: &AllocRequest, block: bool) {
        let is_humongous = self.heap.requires_humongous(req.size());
        if self.try_set_alloc_failure_gc(is_humongous) {
            // Only report the first allocation failure.
            info!(
                "Failed to allocate {}, {}",
                req.type_string(),
                bytes_to_formatted_string(req.size_in_bytes())
            );
            // Now that alloc failure GC is scheduled, we can abort everything else.
            self.cancel_gc(GCCause::AllocationFailure);
            self.notify_control_thread();
        }

        if block {
            self.alloc_failure_waiters
                .wait_while(|| self.is_alloc_failure_gc() && !self.should_terminate());
        }
    }

    /// Evacuation of `words` failed.  Never blocks.
    pub fn handle_alloc_failure_evac(&self, words: usize) {
        let is_humongous = self.heap.requires_humongous(words);
        if self.try_set_alloc_failure_gc(is_humongous) {
            // Only report the first allocation failure.
            info!(
                "Failed to allocate {} for evacuation",
                bytes_to_formatted_string(words_to_bytes(words))
            );
        }
        // Forcefully report allocation failure.
        self.cancel_gc(GCCause::AllocationFailureEvac);
    }

    fn try_set_alloc_failure_gc(&self, is_humongous: bool) -> bool {
        if is_humongous {
            self.humongous_alloc_failure_gc.try_set();
        }
        self.alloc_failure_gc.try_set()
    }

    /// Mutators blocked in `handle_alloc_failure`.
    #[cfg(any(test, feature = "test_private"))]
    pub fn alloc_failure_waiter_count(&self) -> usize {
        self.alloc_failure_waiters.waiters()
    }

    pub fn is_alloc_failure_gc(&self) -> bool {
        self.alloc_failure_gc.is_set()
    }

    pub fn is_humongous_alloc_failure_gc(&self) -> bool {
        self.humongous_alloc_failure_gc.is_set()
    }

    /// Cancel the cycle in flight.  Only the first cancellation notifies the heap.
    pub fn cancel_gc(&self, cause: GCCause) {
        if self.cancelled_gc.try_cancel(cause) {
            info!("Cancelling GC: {}", cause);
            self.heap.cancel_gc(cause);
        }
    }

    pub fn cancelled_gc(&self) -> &CancelledGC {
        &self.cancelled_gc
    }

    /// Request a collection for `cause` and wait until a cycle that started after the request
    /// has completed.
    pub fn request_gc(&self, cause: GCCause) {
        if !cause.is_requested() {
            debug_assert!(false, "{} is not a requested GC cause", cause);
            return;
        }
        if !cause.should_handle_requested(&self.options) {
            info!("Ignoring GC request ({})", cause);
            return;
        }

        // Make sure we have at least one complete GC cycle before unblocking from the explicit
        // GC request.  This is especially important for weak references cleanup and/or native
        // resources (e.g. DirectByteBuffers) machinery: when explicit GC request returns, the
        // caller expects the collection to have happened.
        let required_gc_id = self.get_gc_id() + 1;
        let mut done = false;
        while !done {
            self.gc_waiters.publish_and_wait(None, || {
                if self.get_gc_id() >= required_gc_id || self.should_terminate() {
                    done = true;
                    return false;
                }
                // Overwrite a pending regulator request: this one is stronger.
                self.requested_gc_cause.xchg(cause);
                self.notify_control_thread();
                true
            });
        }
    }

    /// Ask for a concurrent cycle of `generation`.  Returns `true` once the control thread has
    /// picked up the request, `false` if it was rejected.
    pub fn request_concurrent_gc(&self, generation: GenerationType) -> bool {
        if self.preemption_requested.is_set()
            || self.requested_gc_cause.get() != GCCause::NoGc
            || self.cancelled_gc.is_cancelled()
        {
            // Ignore subsequent requests from the heuristics.
            debug!(
                "Reject request for {} cycle: preemption pending {}, request pending {}, cancelled {}",
                generation,
                self.preemption_requested.is_set(),
                self.requested_gc_cause.get(),
                self.cancelled_gc.is_cancelled()
            );
            return false;
        }

        let epoch = self.mode_epoch.load(Ordering::Acquire);
        if self.gc_mode() == GCMode::None {
            self.requested_generation.set(generation);
            if self
                .requested_gc_cause
                .cmpxchg(GCCause::ConcurrentGc, GCCause::NoGc)
                != GCCause::NoGc
            {
                return false;
            }
            self.notify_control_thread();
            self.wait_for_mode_change(GCMode::None, epoch);
            return true;
        }

        if self.preempt_old_marking(generation) {
            info!("Preempting old generation mark to allow {} GC", generation);
            debug_assert_eq!(self.gc_mode(), GCMode::ServicingOld);
            self.requested_generation.set(generation);
            if self
                .requested_gc_cause
                .cmpxchg(GCCause::ConcurrentGc, GCCause::NoGc)
                != GCCause::NoGc
            {
                // A requested GC was posted in the meantime.  It is served once old work yields.
                return false;
            }
            self.preemption_requested.set();
            self.cancel_gc(GCCause::ConcurrentGc);
            self.notify_control_thread();
            self.wait_for_mode_change(GCMode::ServicingOld, epoch);
            return true;
        }

        false
    }

    fn wait_for_mode_change(&self, mode: GCMode, epoch: usize) {
        self.regulator_lock.wait_while(|| {
            self.gc_mode() == mode
                && self.mode_epoch.load(Ordering::Acquire) == epoch
                && !self.should_terminate()
        });
    }

    /// Let a young request interrupt old work, if old work is running and preemptible.
    pub fn preempt_old_marking(&self, generation: GenerationType) -> bool {
        generation.is_young() && self.allow_old_preemption.try_unset()
    }

    /// Mutators allocated `words`.  Feeds the pacer; never exact.
    pub fn pacing_notify_alloc(&self, words: usize) {
        self.allocs_seen.fetch_add(words, Ordering::Relaxed);
    }

    /// Take the allocation count accumulated since the last call.
    pub fn reset_allocs_seen(&self) -> usize {
        self.allocs_seen.swap(0, Ordering::Relaxed)
    }

    pub fn get_gc_id(&self) -> usize {
        self.gc_id.load(Ordering::Acquire)
    }

    /// Only the control thread advances the id.
    pub fn update_gc_id(&self) {
        self.gc_id.fetch_add(1, Ordering::Release);
    }

    /// Clear the allocation failure and wake every mutator waiting for it.
    pub fn notify_alloc_failure_waiters(&self) {
        self.alloc_failure_gc.unset();
        self.humongous_alloc_failure_gc.unset();
        self.alloc_failure_waiters.notify_all();
    }

    pub fn notify_gc_waiters(&self) {
        self.gc_waiters.notify_all();
    }

    pub fn notify_control_thread(&self) {
        self.control_lock.notify_all();
    }

    /// Finish the cycle in flight but start no new one.
    pub fn prepare_for_graceful_shutdown(&self) {
        self.graceful_shutdown.set();
    }

    pub fn in_graceful_shutdown(&self) -> bool {
        self.graceful_shutdown.is_set()
    }

    pub fn should_terminate(&self) -> bool {
        self.should_terminate.is_set()
    }

    /// Tell the control thread (and the regulator, which watches the same flag) to exit.  The
    /// in-flight cycle is cancelled and allowed to unwind.
    pub fn stop_service(&self) {
        self.prepare_for_graceful_shutdown();
        self.cancel_gc(GCCause::StopVm);
        self.policy.record_shutdown();
        self.should_terminate.set();
        self.notify_control_thread();
        self.regulator_lock.notify_all();
    }

    /// Wake every thread blocked on the controller.  Their wait conditions all give up once
    /// `should_terminate` is set.
    pub fn wake_all_waiters(&self) {
        self.alloc_failure_waiters.notify_all();
        self.gc_waiters.notify_all();
        self.regulator_lock.notify_all();
    }

    pub fn policy(&self) -> &CollectorPolicy {
        &self.policy
    }

    pub fn heuristics(&self) -> &HeuristicsSet {
        &self.heuristics
    }

    pub fn old_generation(&self) -> &OldGeneration {
        &self.old_generation
    }

    pub fn degen_point(&self) -> DegenerationPoint {
        self.degen_point.get()
    }

    pub fn requested_gc_cause(&self) -> GCCause {
        self.requested_gc_cause.get()
    }
}
