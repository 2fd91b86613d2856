use super::{Trigger, TriggerContext, TriggerPolicy};
use crate::util::conversions::{bytes_to_formatted_string, percentage};
use crate::util::options::Options;
use crate::util::truncated_seq::TruncatedSeq;
use std::time::{Duration, Instant};

// Free memory at the end of a concurrent cycle within this many standard deviations of the
// average does not adjust the trigger parameters.
const LOWEST_EXPECTED_AVAILABLE_AT_END: f64 = -0.5;
const HIGHEST_EXPECTED_AVAILABLE_AT_END: f64 = 0.5;

// Bounds of the margin of error and the spike threshold, in standard deviations.  These are the
// z-scores of a 25% and a 99.9% confidence interval.
pub const MINIMUM_CONFIDENCE: f64 = 0.319;
pub const MAXIMUM_CONFIDENCE: f64 = 3.291;

// How much a degenerated or full cycle makes the triggers more sensitive.
const DEGENERATE_PENALTY_SD: f64 = 0.1;
const FULL_PENALTY_SD: f64 = 0.2;

/// The allocation rate of mutators, sampled at a fixed frequency.
pub struct AllocationRate {
    last_sample_time: Instant,
    last_sample_value: usize,
    interval: Duration,
    /// Bytes per second.
    rate: TruncatedSeq,
    /// Running averages of `rate`.
    rate_avg: TruncatedSeq,
}

impl AllocationRate {
    pub fn new(options: &Options) -> Self {
        let samples = options.adaptive_sample_size_seconds * options.adaptive_sample_frequency_hz;
        Self {
            last_sample_time: Instant::now(),
            last_sample_value: 0,
            interval: Duration::from_secs_f64(1.0 / options.adaptive_sample_frequency_hz as f64),
            rate: TruncatedSeq::new(samples, options.adaptive_decay_factor),
            rate_avg: TruncatedSeq::new(samples, options.adaptive_decay_factor),
        }
    }

    /// Record that `allocated` bytes have been allocated since the cycle started.  Returns the
    /// instantaneous rate if a sample was taken, 0 otherwise.
    pub fn sample(&mut self, allocated: usize) -> f64 {
        self.sample_at(Instant::now(), allocated)
    }

    fn sample_at(&mut self, now: Instant, allocated: usize) -> f64 {
        let mut rate = 0.0;
        if now.duration_since(self.last_sample_time) > self.interval {
            if allocated >= self.last_sample_value {
                rate = self.instantaneous_rate(now, allocated);
                self.rate.add(rate);
                self.rate_avg.add(self.rate.avg());
            }
            self.last_sample_time = now;
            self.last_sample_value = allocated;
        }
        rate
    }

    /// The rate we expect not to exceed, `sds` standard deviations above the average.
    pub fn upper_bound(&self, sds: f64) -> f64 {
        // The deviation of the running average is much more stable than the deviation of the
        // raw samples, and it is what the average actually varies by.
        self.rate.davg() + sds * self.rate_avg.dsd()
    }

    /// The counter of allocated bytes restarts at every cycle.
    pub fn allocation_counter_reset(&mut self) {
        self.last_sample_time = Instant::now();
        self.last_sample_value = 0;
    }

    /// Is `rate` more than `threshold` standard deviations above the average?
    pub fn is_spiking(&self, rate: f64, threshold: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        let sd = self.rate.sd();
        if sd > 0.0 {
            let z_score = (rate - self.rate.avg()) / sd;
            if z_score > threshold {
                return true;
            }
        }
        false
    }

    fn instantaneous_rate(&self, now: Instant, allocated: usize) -> f64 {
        let allocation_delta = allocated.saturating_sub(self.last_sample_value);
        let time_delta = now.duration_since(self.last_sample_time).as_secs_f64();
        if time_delta > 0.0 {
            allocation_delta as f64 / time_delta
        } else {
            0.0
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TriggerKind {
    Rate,
    Spike,
    Other,
}

/// Starts a cycle early enough that it completes before mutators, allocating at the predicted
/// rate, exhaust the free headroom.
///
/// The margin of error and the spike threshold adapt to how much memory is left at the end of
/// each cycle, and to degenerated and full cycles.
pub struct AdaptiveHeuristics {
    allocation_rate: AllocationRate,
    /// Free memory at the end of recent concurrent cycles.
    available: TruncatedSeq,
    margin_of_error_sd: f64,
    spike_threshold_sd: f64,
    last_trigger: TriggerKind,
}

impl AdaptiveHeuristics {
    pub fn new(options: &Options) -> Self {
        Self {
            allocation_rate: AllocationRate::new(options),
            available: TruncatedSeq::new(
                super::CYCLE_TIME_HISTORY_LENGTH,
                crate::util::truncated_seq::DEFAULT_ALPHA,
            ),
            margin_of_error_sd: options.adaptive_initial_confidence,
            spike_threshold_sd: options.adaptive_initial_spike_threshold,
            last_trigger: TriggerKind::Other,
        }
    }

    pub fn margin_of_error_sd(&self) -> f64 {
        self.margin_of_error_sd
    }

    pub fn spike_threshold_sd(&self) -> f64 {
        self.spike_threshold_sd
    }

    fn adjust_last_trigger_parameters(&mut self, amount: f64) {
        match self.last_trigger {
            TriggerKind::Rate => self.adjust_margin_of_error(amount),
            TriggerKind::Spike => self.adjust_spike_threshold(amount),
            TriggerKind::Other => {}
        }
    }

    fn adjust_margin_of_error(&mut self, amount: f64) {
        self.margin_of_error_sd = (self.margin_of_error_sd + amount)
            .clamp(MINIMUM_CONFIDENCE, MAXIMUM_CONFIDENCE);
        debug!("Margin of error now {:.2}", self.margin_of_error_sd);
    }

    // A lower spike threshold makes the spike trigger more sensitive.
    fn adjust_spike_threshold(&mut self, amount: f64) {
        self.spike_threshold_sd = (self.spike_threshold_sd - amount)
            .clamp(MINIMUM_CONFIDENCE, MAXIMUM_CONFIDENCE);
        debug!("Spike threshold now {:.2}", self.spike_threshold_sd);
    }
}

impl TriggerPolicy for AdaptiveHeuristics {
    fn name(&self) -> &'static str {
        "Adaptive"
    }

    fn should_start_gc(&mut self, ctx: &TriggerContext) -> Trigger {
        let capacity = ctx.usage.soft_max_capacity;
        let available = ctx.usage.soft_available;
        let allocated = ctx.usage.bytes_allocated_since_gc_start;
        trace!(
            "should_start_gc? available: {}, soft_max_capacity: {}, allocated: {}",
            available,
            capacity,
            allocated
        );

        // Track the allocation rate even if we start a cycle for other reasons.
        let rate = self.allocation_rate.sample(allocated);
        self.last_trigger = TriggerKind::Other;

        let min_threshold = percentage(capacity, ctx.options.min_free_threshold);
        if available < min_threshold {
            return Trigger::Start(format!(
                "Free ({}) is below minimum threshold ({})",
                bytes_to_formatted_string(available),
                bytes_to_formatted_string(min_threshold)
            ));
        }

        // Learn a bit about the application first.
        let max_learn = ctx.options.learning_steps;
        if ctx.gc_times_learned < max_learn {
            let init_threshold = percentage(capacity, ctx.options.init_free_threshold);
            if available < init_threshold {
                return Trigger::Start(format!(
                    "Learning {} of {}. Free ({}) is below initial threshold ({})",
                    ctx.gc_times_learned + 1,
                    max_learn,
                    bytes_to_formatted_string(available),
                    bytes_to_formatted_string(init_threshold)
                ));
            }
        }

        // The headroom keeps some space to absorb allocation spikes, and shrinks with the
        // penalties accumulated by degenerated and full cycles.
        let spike_headroom = percentage(capacity, ctx.options.alloc_spike_factor);
        let penalties = percentage(capacity, ctx.gc_time_penalties);
        let allocation_headroom = available
            .saturating_sub(spike_headroom)
            .saturating_sub(penalties);

        let avg_cycle_time =
            ctx.cycle_times.davg() + self.margin_of_error_sd * ctx.cycle_times.dsd();
        let avg_alloc_rate = self.allocation_rate.upper_bound(self.margin_of_error_sd);
        trace!(
            "average GC time: {:.2} ms, allocation rate: {:.0} B/s",
            avg_cycle_time * 1000.0,
            avg_alloc_rate
        );

        if avg_cycle_time * avg_alloc_rate > allocation_headroom as f64 {
            info!(
                "Free headroom: {} (free) - {} (spike) - {} (penalties) = {}",
                bytes_to_formatted_string(available),
                bytes_to_formatted_string(spike_headroom),
                bytes_to_formatted_string(penalties),
                bytes_to_formatted_string(allocation_headroom)
            );
            self.last_trigger = TriggerKind::Rate;
            return Trigger::Start(format!(
                "Average GC time ({:.2} ms) is above the time for average allocation rate ({:.0} B/s) \
                 to deplete free headroom ({}) (margin of error = {:.2})",
                avg_cycle_time * 1000.0,
                avg_alloc_rate,
                bytes_to_formatted_string(allocation_headroom),
                self.margin_of_error_sd
            ));
        }

        let is_spiking = self
            .allocation_rate
            .is_spiking(rate, self.spike_threshold_sd);
        if is_spiking && avg_cycle_time > allocation_headroom as f64 / rate {
            self.last_trigger = TriggerKind::Spike;
            return Trigger::Start(format!(
                "Average GC time ({:.2} ms) is above the time for instantaneous allocation rate \
                 ({:.0} B/s) to deplete free headroom ({}) (spike threshold = {:.2})",
                avg_cycle_time * 1000.0,
                rate,
                bytes_to_formatted_string(allocation_headroom),
                self.spike_threshold_sd
            ));
        }

        Trigger::Defer
    }

    fn record_cycle_start(&mut self) {
        self.allocation_rate.allocation_counter_reset();
    }

    fn record_success_concurrent(&mut self, available: usize) {
        let mut z_score = 0.0;
        let available_sd = self.available.sd();
        if available_sd > 0.0 {
            let available_avg = self.available.avg();
            z_score = (available as f64 - available_avg) / available_sd;
            debug!(
                "Available: {}, z-score={:.3}. Average available: {:.1} B +/- {:.1} B.",
                bytes_to_formatted_string(available),
                z_score,
                available_avg,
                available_sd
            );
        }
        self.available.add(available as f64);

        // Less memory than usual at the end of the cycle makes the trigger that started it more
        // sensitive, more makes it less sensitive.  Small deviations are ignored.
        if !(LOWEST_EXPECTED_AVAILABLE_AT_END..=HIGHEST_EXPECTED_AVAILABLE_AT_END)
            .contains(&z_score)
        {
            self.adjust_last_trigger_parameters(z_score / -100.0);
        }
    }

    fn record_degenerated(&mut self) {
        self.adjust_margin_of_error(DEGENERATE_PENALTY_SD);
        self.adjust_spike_threshold(DEGENERATE_PENALTY_SD);
    }

    fn record_success_full(&mut self) {
        self.adjust_margin_of_error(FULL_PENALTY_SD);
        self.adjust_spike_threshold(FULL_PENALTY_SD);
    }
}
