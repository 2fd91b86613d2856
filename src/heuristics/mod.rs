//! Per-generation policy deciding when a cycle should start and whether a cancelled cycle should
//! degenerate.
//!
//! [`Heuristics`] holds everything common to all policies: the trigger bookkeeping, the penalties
//! accumulated by degenerated and full cycles, the history of cycle durations, the metaspace
//! exhaustion flag and the starvation bound.  The part that differs between policies is a
//! [`TriggerPolicy`] chosen from [`Options::heuristics`](crate::util::options::Options).

use crate::plan::{GenerationType, OldGeneration};
use crate::util::options::{HeuristicsSelector, Options};
use crate::util::shared::SharedFlag;
use crate::util::truncated_seq::TruncatedSeq;
use crate::vm::{GenerationUsage, Heap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

mod adaptive;
mod aggressive;
mod compact;
mod old;
mod static_heuristics;

pub use self::adaptive::AdaptiveHeuristics;
pub use self::aggressive::AggressiveHeuristics;
pub use self::compact::CompactHeuristics;
pub use self::old::OldHeuristics;
pub use self::static_heuristics::StaticHeuristics;

/// Number of cycle durations kept to predict the next one.
pub const CYCLE_TIME_HISTORY_LENGTH: usize = 10;

/// What a [`TriggerPolicy`] thinks about starting a cycle now.
#[derive(Clone, Debug, PartialEq)]
pub enum Trigger {
    /// Start a cycle.  The string says why, for the log.
    Start(String),
    /// No reason to start from this policy.  The common checks (metaspace, starvation) decide.
    Defer,
    /// Do not start, whatever the common checks say.
    Decline,
}

/// What a [`TriggerPolicy`] may look at when deciding.
pub struct TriggerContext<'a> {
    pub usage: GenerationUsage,
    /// Accumulated penalty, as a percentage of capacity.
    pub gc_time_penalties: usize,
    /// Successful concurrent cycles since the last time learning restarted.
    pub gc_times_learned: usize,
    /// Durations of recent concurrent cycles, in seconds.
    pub cycle_times: &'a TruncatedSeq,
    pub options: &'a Options,
}

/// A trigger strategy.  All methods are called with the heuristics lock held, so the strategy can
/// keep its own mutable state.
pub trait TriggerPolicy: Send {
    fn name(&self) -> &'static str;

    fn should_start_gc(&mut self, ctx: &TriggerContext) -> Trigger;

    fn record_cycle_start(&mut self) {}

    /// A concurrent cycle completed.  `available` is the free memory right after it.
    fn record_success_concurrent(&mut self, available: usize) {
        let _ = available;
    }

    fn record_degenerated(&mut self) {}

    fn record_success_full(&mut self) {}

    /// Unload classes in every cycle that can.
    fn always_unload_classes(&self) -> bool {
        false
    }
}

struct HeuristicsState {
    policy: Box<dyn TriggerPolicy>,
    declined_trigger_count: usize,
    most_recent_declined_trigger_count: usize,
    gc_time_penalties: usize,
    gc_times_learned: usize,
    /// Degenerated cycles since the last concurrent or full success.
    degenerated_in_a_row: usize,
    allocation_failure_gcs: usize,
    cycle_times: TruncatedSeq,
    cycle_start: Instant,
    last_cycle_end: Instant,
}

/// The policy engine of one generation.
///
/// The regulator asks [`should_start_gc`](Heuristics::should_start_gc); the control thread reports
/// outcomes through the `record_*` methods.  No decision is ever fatal: `false` only defers.
pub struct Heuristics {
    generation: GenerationType,
    heap: Arc<dyn Heap>,
    options: Arc<Options>,
    /// 0 disables the starvation bound.
    guaranteed_gc_interval: Duration,
    /// A trigger has been accepted and not yet consumed by a request or a cycle start.
    start_gc_is_pending: SharedFlag,
    metaspace_oom: SharedFlag,
    state: Mutex<HeuristicsState>,
}

impl Heuristics {
    pub fn new(
        generation: GenerationType,
        policy: Box<dyn TriggerPolicy>,
        heap: Arc<dyn Heap>,
        options: Arc<Options>,
    ) -> Self {
        let guaranteed_gc_interval = Duration::from_millis(match generation {
            GenerationType::Young => options.guaranteed_young_gc_interval,
            GenerationType::Old => options.guaranteed_old_gc_interval,
            GenerationType::NonGen | GenerationType::Global => options.guaranteed_gc_interval,
        });
        if options.full_penalty <= options.degenerated_penalty {
            warn!(
                "full_penalty ({}) is not larger than degenerated_penalty ({}). Using {} for full cycles.",
                options.full_penalty,
                options.degenerated_penalty,
                options.effective_full_penalty()
            );
        }
        let now = Instant::now();
        Self {
            generation,
            heap,
            guaranteed_gc_interval,
            start_gc_is_pending: SharedFlag::new(),
            metaspace_oom: SharedFlag::new(),
            state: Mutex::new(HeuristicsState {
                policy,
                declined_trigger_count: 0,
                most_recent_declined_trigger_count: 0,
                gc_time_penalties: 0,
                gc_times_learned: 0,
                degenerated_in_a_row: 0,
                allocation_failure_gcs: 0,
                cycle_times: TruncatedSeq::new(
                    CYCLE_TIME_HISTORY_LENGTH,
                    crate::util::truncated_seq::DEFAULT_ALPHA,
                ),
                cycle_start: now,
                last_cycle_end: now,
            }),
            options,
        }
    }

    /// Heuristics for `generation` using the trigger strategy selected by `selector`.
    pub fn with_selector(
        generation: GenerationType,
        selector: HeuristicsSelector,
        heap: Arc<dyn Heap>,
        options: Arc<Options>,
    ) -> Self {
        let policy: Box<dyn TriggerPolicy> = match selector {
            HeuristicsSelector::Adaptive => Box::new(AdaptiveHeuristics::new(&options)),
            HeuristicsSelector::Static => Box::new(StaticHeuristics),
            HeuristicsSelector::Compact => Box::new(CompactHeuristics),
            HeuristicsSelector::Aggressive => Box::new(AggressiveHeuristics),
        };
        Self::new(generation, policy, heap, options)
    }

    pub fn generation(&self) -> GenerationType {
        self.generation
    }

    pub fn name(&self) -> &'static str {
        self.state.lock().unwrap().policy.name()
    }

    /// Should a cycle of this generation start now?
    ///
    /// Returns `true` at most once per accepted trigger: a `true` answer accepts the trigger and
    /// leaves it pending until [`cancel_trigger_request`](Heuristics::cancel_trigger_request) or
    /// the next cycle start consumes it.  While pending, the answer is `false`.
    pub fn should_start_gc(&self) -> bool {
        if self.start_gc_is_pending.is_set() {
            return false;
        }

        let usage = self.heap.usage(self.generation);
        let mut state = self.state.lock().unwrap();
        // The trigger is only accepted under the lock.  Another caller may have accepted one
        // since the check above.
        if self.start_gc_is_pending.is_set() {
            return false;
        }
        let state = &mut *state;
        let ctx = TriggerContext {
            usage,
            gc_time_penalties: state.gc_time_penalties,
            gc_times_learned: state.gc_times_learned,
            cycle_times: &state.cycle_times,
            options: &self.options,
        };

        let reason = match state.policy.should_start_gc(&ctx) {
            Trigger::Start(reason) => Some(reason),
            Trigger::Decline => None,
            Trigger::Defer => self.common_trigger(state.last_cycle_end),
        };

        match reason {
            Some(reason) => {
                Self::accept_trigger_locked(state, &self.start_gc_is_pending);
                self.log_trigger_with_declined(&reason, state.most_recent_declined_trigger_count);
                true
            }
            None => {
                state.declined_trigger_count += 1;
                false
            }
        }
    }

    /// Triggers shared by every strategy: metaspace exhaustion, then the starvation bound.
    fn common_trigger(&self, last_cycle_end: Instant) -> Option<String> {
        if self.has_metaspace_oom() {
            return Some(crate::plan::GCCause::MetadataGcThreshold.to_string());
        }
        if !self.guaranteed_gc_interval.is_zero() {
            let since_last = last_cycle_end.elapsed();
            if since_last > self.guaranteed_gc_interval {
                return Some(format!(
                    "Time since last GC ({} ms) is larger than guaranteed interval ({} ms)",
                    since_last.as_millis(),
                    self.guaranteed_gc_interval.as_millis()
                ));
            }
        }
        None
    }

    fn accept_trigger_locked(state: &mut HeuristicsState, pending: &SharedFlag) {
        state.most_recent_declined_trigger_count = state.declined_trigger_count;
        state.declined_trigger_count = 0;
        pending.set();
    }

    /// Act on a trigger.  [`should_start_gc`](Heuristics::should_start_gc) calls this itself when
    /// it answers `true`.
    pub fn accept_trigger(&self) {
        let mut state = self.state.lock().unwrap();
        Self::accept_trigger_locked(&mut state, &self.start_gc_is_pending);
    }

    /// A trigger was evaluated and not acted on.
    pub fn decline_trigger(&self) {
        self.state.lock().unwrap().declined_trigger_count += 1;
    }

    /// Consume the pending trigger.  The regulator calls this once the control thread has taken
    /// or rejected its request.
    pub fn cancel_trigger_request(&self) {
        self.start_gc_is_pending.unset();
    }

    pub fn is_start_gc_pending(&self) -> bool {
        self.start_gc_is_pending.is_set()
    }

    pub fn declined_trigger_count(&self) -> usize {
        self.state.lock().unwrap().declined_trigger_count
    }

    pub fn most_recent_declined_trigger_count(&self) -> usize {
        self.state.lock().unwrap().most_recent_declined_trigger_count
    }

    pub fn log_trigger(&self, reason: &str) {
        if self.generation == GenerationType::NonGen {
            info!("Trigger: {}", reason);
        } else {
            info!("Trigger ({}): {}", self.generation, reason);
        }
    }

    fn log_trigger_with_declined(&self, reason: &str, declined: usize) {
        self.log_trigger(reason);
        debug!(
            "{} trigger{} declined since the previous trigger",
            declined,
            if declined == 1 { "" } else { "s" }
        );
    }

    pub fn record_cycle_start(&self) {
        let mut state = self.state.lock().unwrap();
        state.cycle_start = Instant::now();
        state.policy.record_cycle_start();
        self.start_gc_is_pending.unset();
    }

    pub fn record_cycle_end(&self) {
        self.state.lock().unwrap().last_cycle_end = Instant::now();
    }

    fn adjust_penalty(&self, state: &mut HeuristicsState, step: isize) {
        let max = self.options.max_penalty as isize;
        let new_val = (state.gc_time_penalties as isize + step).clamp(0, max);
        state.gc_time_penalties = new_val as usize;
    }

    pub fn record_success_concurrent(&self) {
        let available = self.heap.usage(self.generation).soft_available;
        let mut state = self.state.lock().unwrap();
        let elapsed = state.cycle_start.elapsed().as_secs_f64();
        state.cycle_times.add(elapsed);
        state.gc_times_learned += 1;
        state.degenerated_in_a_row = 0;
        self.adjust_penalty(
            &mut state,
            -(self.options.concurrent_penalty_recovery as isize),
        );
        state.policy.record_success_concurrent(available);
    }

    pub fn record_degenerated(&self) {
        let mut state = self.state.lock().unwrap();
        state.degenerated_in_a_row += 1;
        self.adjust_penalty(&mut state, self.options.degenerated_penalty as isize);
        state.policy.record_degenerated();
    }

    pub fn record_success_full(&self) {
        let mut state = self.state.lock().unwrap();
        state.degenerated_in_a_row = 0;
        self.adjust_penalty(&mut state, self.options.effective_full_penalty() as isize);
        state.policy.record_success_full();
    }

    pub fn record_allocation_failure_gc(&self) {
        self.state.lock().unwrap().allocation_failure_gcs += 1;
    }

    /// Users request collections when external state changes significantly, so cycle timings
    /// and allocation rates have to be learned again.
    pub fn record_requested_gc(&self) {
        self.state.lock().unwrap().gc_times_learned = 0;
    }

    pub fn gc_time_penalties(&self) -> usize {
        self.state.lock().unwrap().gc_time_penalties
    }

    pub fn gc_times_learned(&self) -> usize {
        self.state.lock().unwrap().gc_times_learned
    }

    pub fn allocation_failure_gcs(&self) -> usize {
        self.state.lock().unwrap().allocation_failure_gcs
    }

    /// Average duration of recent concurrent cycles.
    pub fn average_cycle_time(&self) -> Duration {
        Duration::from_secs_f64(self.state.lock().unwrap().cycle_times.avg())
    }

    /// Should a cancelled cycle degenerate, rather than go straight to a full GC?
    pub fn should_degenerate_cycle(&self) -> bool {
        self.state.lock().unwrap().degenerated_in_a_row <= self.options.full_gc_threshold
    }

    pub fn record_metaspace_oom(&self) {
        self.metaspace_oom.set();
    }

    pub fn clear_metaspace_oom(&self) {
        self.metaspace_oom.unset();
    }

    pub fn has_metaspace_oom(&self) -> bool {
        self.metaspace_oom.is_set()
    }

    pub fn can_unload_classes(&self) -> bool {
        self.options.class_unloading
    }

    /// Should the cycle numbered `cycle` unload classes?
    pub fn should_unload_classes(&self, cycle: usize) -> bool {
        if !self.can_unload_classes() {
            return false;
        }
        if self.has_metaspace_oom() || self.state.lock().unwrap().policy.always_unload_classes() {
            return true;
        }
        // Offset by one so that unloading does not land on the same cycle as other periodic work.
        let frequency = self.options.unload_classes_frequency;
        frequency > 0 && (cycle + 1) % frequency == 0
    }

    pub fn time_since_last_gc(&self) -> Duration {
        self.state.lock().unwrap().last_cycle_end.elapsed()
    }
}

/// The heuristics of every generation the collector manages.
///
/// Without generations there is a single [`GenerationType::NonGen`] instance, and asking for the
/// young or old heuristics returns it.
pub struct HeuristicsSet {
    global: Heuristics,
    young: Option<Heuristics>,
    old: Option<Heuristics>,
}

impl HeuristicsSet {
    pub fn new(
        heap: &Arc<dyn Heap>,
        options: &Arc<Options>,
        old_generation: &Arc<OldGeneration>,
    ) -> Self {
        if options.generational {
            let global = Heuristics::with_selector(
                GenerationType::Global,
                options.heuristics,
                heap.clone(),
                options.clone(),
            );
            let young = Heuristics::with_selector(
                GenerationType::Young,
                options.heuristics,
                heap.clone(),
                options.clone(),
            );
            let old = Heuristics::new(
                GenerationType::Old,
                Box::new(OldHeuristics::new(old_generation.clone())),
                heap.clone(),
                options.clone(),
            );
            Self {
                global,
                young: Some(young),
                old: Some(old),
            }
        } else {
            Self {
                global: Heuristics::with_selector(
                    GenerationType::NonGen,
                    options.heuristics,
                    heap.clone(),
                    options.clone(),
                ),
                young: None,
                old: None,
            }
        }
    }

    pub fn is_generational(&self) -> bool {
        self.young.is_some()
    }

    pub fn global(&self) -> &Heuristics {
        &self.global
    }

    pub fn young(&self) -> Option<&Heuristics> {
        self.young.as_ref()
    }

    pub fn old(&self) -> Option<&Heuristics> {
        self.old.as_ref()
    }

    /// The heuristics responsible for `generation`.
    pub fn get(&self, generation: GenerationType) -> &Heuristics {
        match generation {
            GenerationType::Young => self.young.as_ref().unwrap_or(&self.global),
            GenerationType::Old => self.old.as_ref().unwrap_or(&self.global),
            GenerationType::NonGen | GenerationType::Global => &self.global,
        }
    }

    /// The generation collected by the whole-heap cycles (requests, full GCs).
    pub fn global_generation(&self) -> GenerationType {
        self.global.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_util::mock_vm::MockVM;
    use crate::util::test_util::serial_test;
    use std::thread::sleep;

    fn options_with(pairs: &[(&str, &str)]) -> Arc<Options> {
        let mut options = Options::default();
        for (k, v) in pairs {
            assert!(options.set_from_str(k, v), "{}={}", k, v);
        }
        Arc::new(options)
    }

    fn static_heuristics(options: Arc<Options>) -> Heuristics {
        let heap: Arc<dyn Heap> = Arc::new(MockVM::default());
        Heuristics::with_selector(
            GenerationType::NonGen,
            HeuristicsSelector::Static,
            heap,
            options,
        )
    }

    #[test]
    fn no_trigger_without_pressure() {
        serial_test(|| {
            let heuristics = static_heuristics(options_with(&[("guaranteed_gc_interval", "0")]));
            for _ in 0..100 {
                assert!(!heuristics.should_start_gc());
            }
            assert_eq!(heuristics.declined_trigger_count(), 100);
        })
    }

    #[test]
    fn guaranteed_interval_triggers_once() {
        serial_test(|| {
            let heuristics = static_heuristics(options_with(&[("guaranteed_gc_interval", "20")]));
            assert!(!heuristics.should_start_gc());
            assert!(!heuristics.should_start_gc());
            sleep(Duration::from_millis(40));
            assert!(heuristics.should_start_gc());
            assert_eq!(heuristics.declined_trigger_count(), 0);
            assert_eq!(heuristics.most_recent_declined_trigger_count(), 2);
            // The trigger is pending until consumed.
            assert!(!heuristics.should_start_gc());
            assert!(!heuristics.should_start_gc());
            heuristics.cancel_trigger_request();
            assert!(heuristics.should_start_gc());
        })
    }

    #[test]
    fn concurrent_callers_accept_one_trigger() {
        serial_test(|| {
            let heap: Arc<dyn Heap> = Arc::new(MockVM::default());
            let heuristics = Arc::new(Heuristics::with_selector(
                GenerationType::NonGen,
                HeuristicsSelector::Aggressive,
                heap,
                Arc::new(Options::default()),
            ));
            const THREADS: usize = 8;
            for _ in 0..200 {
                let barrier = Arc::new(std::sync::Barrier::new(THREADS));
                let handles: Vec<_> = (0..THREADS)
                    .map(|_| {
                        let heuristics = heuristics.clone();
                        let barrier = barrier.clone();
                        std::thread::spawn(move || {
                            barrier.wait();
                            heuristics.should_start_gc()
                        })
                    })
                    .collect();
                let accepted = handles
                    .into_iter()
                    .map(|h| h.join().unwrap())
                    .filter(|accepted| *accepted)
                    .count();
                assert_eq!(accepted, 1);
                assert!(heuristics.is_start_gc_pending());
                heuristics.cancel_trigger_request();
            }
        })
    }

    #[test]
    fn cycle_end_resets_starvation_clock() {
        serial_test(|| {
            let heuristics = static_heuristics(options_with(&[("guaranteed_gc_interval", "30")]));
            sleep(Duration::from_millis(40));
            heuristics.record_cycle_start();
            heuristics.record_cycle_end();
            assert!(!heuristics.should_start_gc());
            assert!(heuristics.time_since_last_gc() < Duration::from_millis(30));
        })
    }

    #[test]
    fn metaspace_oom_triggers() {
        serial_test(|| {
            let heuristics = static_heuristics(options_with(&[("guaranteed_gc_interval", "0")]));
            assert!(!heuristics.should_start_gc());
            heuristics.record_metaspace_oom();
            assert!(heuristics.has_metaspace_oom());
            assert!(heuristics.should_start_gc());
            assert!(heuristics.should_unload_classes(0));
            heuristics.cancel_trigger_request();
            heuristics.clear_metaspace_oom();
            assert!(!heuristics.should_start_gc());
        })
    }

    #[test]
    fn penalties_follow_outcomes() {
        serial_test(|| {
            let heuristics = static_heuristics(Arc::new(Options::default()));
            heuristics.record_degenerated();
            heuristics.record_degenerated();
            heuristics.record_degenerated();
            assert_eq!(heuristics.gc_time_penalties(), 30);
            heuristics.record_cycle_start();
            heuristics.record_success_concurrent();
            assert_eq!(heuristics.gc_time_penalties(), 29);
            heuristics.record_success_full();
            assert_eq!(heuristics.gc_time_penalties(), 49);
        })
    }

    #[test]
    fn penalties_are_clamped() {
        serial_test(|| {
            let heuristics = static_heuristics(options_with(&[("concurrent_penalty_recovery", "5")]));
            heuristics.record_cycle_start();
            heuristics.record_success_concurrent();
            assert_eq!(heuristics.gc_time_penalties(), 0);
            for _ in 0..20 {
                heuristics.record_success_full();
            }
            assert_eq!(heuristics.gc_time_penalties(), 100);
        })
    }

    #[test]
    fn degenerate_until_threshold() {
        serial_test(|| {
            let heuristics = static_heuristics(options_with(&[("full_gc_threshold", "2")]));
            assert!(heuristics.should_degenerate_cycle());
            heuristics.record_degenerated();
            heuristics.record_degenerated();
            assert!(heuristics.should_degenerate_cycle());
            heuristics.record_degenerated();
            assert!(!heuristics.should_degenerate_cycle());
            heuristics.record_success_full();
            assert!(heuristics.should_degenerate_cycle());
        })
    }

    #[test]
    fn requested_gc_restarts_learning() {
        serial_test(|| {
            let heuristics = static_heuristics(Arc::new(Options::default()));
            for _ in 0..3 {
                heuristics.record_cycle_start();
                heuristics.record_success_concurrent();
            }
            assert_eq!(heuristics.gc_times_learned(), 3);
            heuristics.record_requested_gc();
            assert_eq!(heuristics.gc_times_learned(), 0);
        })
    }

    #[test]
    fn class_unloading_frequency() {
        serial_test(|| {
            let heuristics =
                static_heuristics(options_with(&[("unload_classes_frequency", "3")]));
            assert!(!heuristics.should_unload_classes(0));
            assert!(!heuristics.should_unload_classes(1));
            assert!(heuristics.should_unload_classes(2));

            let never = static_heuristics(options_with(&[("class_unloading", "false")]));
            never.record_metaspace_oom();
            assert!(!never.should_unload_classes(2));
        })
    }

    #[test]
    fn heuristics_set_without_generations() {
        serial_test(|| {
            let heap: Arc<dyn Heap> = Arc::new(MockVM::default());
            let options = Arc::new(Options::default());
            let set = HeuristicsSet::new(&heap, &options, &Arc::new(OldGeneration::new()));
            assert!(!set.is_generational());
            assert_eq!(set.get(GenerationType::Young).generation(), GenerationType::NonGen);
            assert_eq!(set.global_generation(), GenerationType::NonGen);
            assert_eq!(set.global().name(), "Adaptive");
        })
    }

    #[test]
    fn heuristics_set_with_generations() {
        serial_test(|| {
            let heap: Arc<dyn Heap> = Arc::new(MockVM::default());
            let options = options_with(&[("generational", "true"), ("heuristics", "compact")]);
            let set = HeuristicsSet::new(&heap, &options, &Arc::new(OldGeneration::new()));
            assert!(set.is_generational());
            assert_eq!(set.get(GenerationType::Young).name(), "Compact");
            assert_eq!(set.get(GenerationType::Old).name(), "Old");
            assert_eq!(set.global_generation(), GenerationType::Global);
        })
    }
}
