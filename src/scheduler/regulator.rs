//! The regulator thread: polls the heuristics and turns their decisions into requests to the
//! control thread.
//!
//! Keeping this off the control thread lets a young collection be requested while the control
//! thread is busy with long-running old work, which the request then preempts.

use super::controller::{Controller, GCMode};
use crate::heuristics::{Heuristics, HeuristicsSet};
use crate::util::error::{GCControlError, GCControlResult};
use crate::util::monitor::Monitor;
use crate::util::options::Options;
use crate::util::shared::SharedFlag;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use strum_macros::Display;

/// How the regulator decides between generations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum RegulationMode {
    /// Not generational: only global cycles.
    Global,
    /// Young cycles, old cycles, and young cycles preempting old marking.
    YoungAndOld,
    /// Generational without old preemption: global cycles first, then young.
    YoungAndGlobal,
}

impl RegulationMode {
    pub fn select(options: &Options) -> Self {
        if !options.generational {
            RegulationMode::Global
        } else if options.allow_old_marking_preemption {
            RegulationMode::YoungAndOld
        } else {
            RegulationMode::YoungAndGlobal
        }
    }
}

/// The regulator's sleep between two polls.
///
/// Any heap change brings it back to the minimum.  Otherwise it doubles at most once per adjust
/// period, up to the maximum.
#[derive(Clone, Debug)]
pub struct Backoff {
    sleep: Duration,
    min: Duration,
    max: Duration,
    adjust_period: Duration,
    last_adjust: Instant,
}

impl Backoff {
    pub fn new(options: &Options) -> Self {
        Self::with_bounds(
            Duration::from_millis(options.control_interval_min),
            Duration::from_millis(options.control_interval_max),
            Duration::from_millis(options.control_interval_adjust_period),
            Instant::now(),
        )
    }

    pub fn with_bounds(min: Duration, max: Duration, adjust_period: Duration, now: Instant) -> Self {
        debug_assert!(min <= max);
        Self {
            sleep: min,
            min,
            max,
            adjust_period,
            last_adjust: now,
        }
    }

    /// The sleep to take now.  `heap_changed` says whether anything happened since the last poll.
    pub fn next(&mut self, heap_changed: bool, now: Instant) -> Duration {
        if heap_changed {
            self.sleep = self.min;
        } else if now.saturating_duration_since(self.last_adjust) > self.adjust_period {
            self.sleep = self
                .max
                .min((self.sleep * 2).max(Duration::from_millis(1)));
            self.last_adjust = now;
        }
        self.sleep
    }

    pub fn current(&self) -> Duration {
        self.sleep
    }
}

pub struct Regulator {
    controller: Arc<Controller>,
    heuristics: Arc<HeuristicsSet>,
    options: Arc<Options>,
    mode: RegulationMode,
    heap_changed: SharedFlag,
    /// The regulator sleeps here, so that stopping does not wait for a whole sleep.
    sleep_monitor: Monitor,
}

impl Regulator {
    pub fn new(
        controller: Arc<Controller>,
        heuristics: Arc<HeuristicsSet>,
        options: Arc<Options>,
    ) -> Self {
        let mode = RegulationMode::select(&options);
        Self {
            controller,
            heuristics,
            options,
            mode,
            heap_changed: SharedFlag::new(),
            sleep_monitor: Monitor::new(),
        }
    }

    pub fn spawn(self: &Arc<Self>) -> GCControlResult<JoinHandle<()>> {
        let regulator = self.clone();
        std::thread::Builder::new()
            .name("GC Regulator Thread".to_string())
            .spawn(move || regulator.run_service())
            .map_err(|source| GCControlError::SpawnThread {
                name: "regulator",
                source,
            })
    }

    pub fn mode(&self) -> RegulationMode {
        self.mode
    }

    /// Something changed on the heap that the heuristics should look at soon.  Fire and forget.
    pub fn notify_heap_changed(&self) {
        // Update the flag only when it is not set already.  This avoids contending on the cache
        // line when many threads allocate.
        if self.heap_changed.is_unset() {
            self.heap_changed.set();
        }
    }

    /// Wake the regulator from its sleep, e.g. to observe termination.
    pub fn wake_up(&self) {
        self.sleep_monitor.notify_all();
    }

    pub fn run_service(&self) {
        info!("Regulator started in {} mode", self.mode);
        let mut backoff = Backoff::new(&self.options);
        while !self.controller.should_terminate() {
            self.regulate_once();
            self.regulator_sleep(&mut backoff);
        }
        debug!("Regulator exits");
    }

    /// One poll of the heuristics.
    pub fn regulate_once(&self) {
        match self.mode {
            RegulationMode::Global => self.regulate_global_cycles(),
            RegulationMode::YoungAndOld => self.regulate_young_and_old_cycles(),
            RegulationMode::YoungAndGlobal => self.regulate_young_and_global_cycles(),
        }
    }

    fn regulate_global_cycles(&self) {
        if self.controller.gc_mode() != GCMode::None {
            return;
        }
        if self.should_start_metaspace_gc() {
            if self.request_concurrent_gc(self.heuristics.global()) {
                debug!("Heuristics request for global (unload classes) accepted.");
            }
        } else if self.start_cycle(self.heuristics.global()) {
            debug!("Heuristics request for global collection accepted.");
        }
    }

    fn regulate_young_and_old_cycles(&self) {
        let (Some(young), Some(old)) = (self.heuristics.young(), self.heuristics.old()) else {
            return self.regulate_global_cycles();
        };
        match self.controller.gc_mode() {
            GCMode::None => {
                if self.should_start_metaspace_gc() {
                    if self.request_concurrent_gc(self.heuristics.global()) {
                        debug!("Heuristics request for global (unload classes) accepted.");
                    }
                } else if young.should_start_gc() {
                    // Give the old generation a chance to run.  The old generation cycle
                    // begins with a bootstrap cycle that also collects young.
                    if self.start_cycle(old) {
                        debug!("Heuristics request for old collection accepted");
                    } else if self.request_concurrent_gc(young) {
                        debug!("Heuristics request for young collection accepted");
                    }
                    young.cancel_trigger_request();
                } else if self.start_cycle(old) {
                    debug!("Heuristics request for old collection accepted");
                }
            }
            GCMode::ServicingOld => {
                if self.start_cycle(young) {
                    debug!("Heuristics request to interrupt old for young collection accepted");
                }
            }
            _ => {}
        }
    }

    fn regulate_young_and_global_cycles(&self) {
        if self.controller.gc_mode() != GCMode::None {
            return;
        }
        if self.should_start_metaspace_gc() {
            if self.request_concurrent_gc(self.heuristics.global()) {
                debug!("Heuristics request for global (unload classes) accepted.");
            }
        } else if self.start_cycle(self.heuristics.global()) {
            debug!("Heuristics request for global collection accepted.");
        } else if let Some(young) = self.heuristics.young() {
            if self.start_cycle(young) {
                debug!("Heuristics request for young collection accepted.");
            }
        }
    }

    fn start_cycle(&self, heuristics: &Heuristics) -> bool {
        heuristics.should_start_gc() && self.request_concurrent_gc(heuristics)
    }

    fn should_start_metaspace_gc(&self) -> bool {
        let global = self.heuristics.global();
        global.can_unload_classes() && global.has_metaspace_oom()
    }

    /// Request a cycle of the generation of `heuristics`, then consume its trigger whether or
    /// not the control thread took the request.
    fn request_concurrent_gc(&self, heuristics: &Heuristics) -> bool {
        let start = Instant::now();
        let accepted = self
            .controller
            .request_concurrent_gc(heuristics.generation());
        if accepted {
            let wait_time = start.elapsed();
            if wait_time > Duration::from_millis(1) {
                debug!(
                    "Regulator waited {:.3}s for control thread to acknowledge request.",
                    wait_time.as_secs_f64()
                );
            }
        }
        heuristics.cancel_trigger_request();
        accepted
    }

    fn regulator_sleep(&self, backoff: &mut Backoff) {
        // Wait before performing the next action.  If allocation happened during this wait, we
        // exit sooner, to let heuristics re-evaluate new conditions.  If we are at idle, back off
        // exponentially.
        let start = Instant::now();
        let sleep = backoff.next(self.heap_changed.try_unset(), start);
        self.sleep_monitor
            .wait_while_timeout(sleep, || !self.controller.should_terminate());
        let hiccup = start.elapsed().saturating_sub(sleep);
        if hiccup > Duration::from_millis(1) {
            debug!("Regulator hiccup time: {:.3}s", hiccup.as_secs_f64());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let start = Instant::now();
        let mut backoff = Backoff::with_bounds(ms(1), ms(10), ms(0), start);
        let sleeps: Vec<u64> = (1..=6)
            .map(|i| backoff.next(false, start + ms(i)).as_millis() as u64)
            .collect();
        assert_eq!(sleeps, vec![2, 4, 8, 10, 10, 10]);
    }

    #[test]
    fn backoff_resets_on_heap_change() {
        let start = Instant::now();
        let mut backoff = Backoff::with_bounds(ms(1), ms(10), ms(0), start);
        for i in 1..=5 {
            backoff.next(false, start + ms(i));
        }
        assert_eq!(backoff.current(), ms(10));
        assert_eq!(backoff.next(true, start + ms(6)), ms(1));
        assert_eq!(backoff.next(false, start + ms(7)), ms(2));
    }

    #[test]
    fn backoff_waits_for_adjust_period() {
        let start = Instant::now();
        let mut backoff = Backoff::with_bounds(ms(1), ms(64), ms(100), start);
        assert_eq!(backoff.next(false, start + ms(50)), ms(1));
        assert_eq!(backoff.next(false, start + ms(101)), ms(2));
        assert_eq!(backoff.next(false, start + ms(150)), ms(2));
        assert_eq!(backoff.next(false, start + ms(202)), ms(4));
    }

    #[test]
    fn backoff_is_monotonic_between_changes() {
        use rand::Rng;
        let mut rng = rand::rng();
        let start = Instant::now();
        let mut backoff = Backoff::with_bounds(ms(1), ms(50), ms(3), start);
        let mut now = start;
        let mut previous = backoff.current();
        for _ in 0..500 {
            now += ms(rng.random_range(0..5));
            let changed = rng.random_bool(0.1);
            let sleep = backoff.next(changed, now);
            if changed {
                assert_eq!(sleep, ms(1));
            } else {
                assert!(sleep >= previous);
                assert!(sleep <= ms(50));
            }
            previous = sleep;
        }
    }

    #[test]
    fn mode_follows_options() {
        crate::util::test_util::serial_test(|| {
            let mut options = Options::default();
            assert_eq!(RegulationMode::select(&options), RegulationMode::Global);
            options.generational = true;
            assert_eq!(RegulationMode::select(&options), RegulationMode::YoungAndOld);
            options.allow_old_marking_preemption = false;
            assert_eq!(RegulationMode::select(&options), RegulationMode::YoungAndGlobal);
        })
    }
}
