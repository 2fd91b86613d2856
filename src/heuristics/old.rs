use super::{Trigger, TriggerContext, TriggerPolicy};
use crate::plan::OldGeneration;
use crate::util::conversions::bytes_to_formatted_string;
use std::sync::Arc;

/// Starts old collections when the old generation has grown enough since the last old mark.
pub struct OldHeuristics {
    old_generation: Arc<OldGeneration>,
}

impl OldHeuristics {
    pub fn new(old_generation: Arc<OldGeneration>) -> Self {
        Self { old_generation }
    }

    /// Old usage above which a new old collection starts.
    fn usage_trigger_threshold(&self, growth_percent: f64) -> usize {
        let live = self.old_generation.live_bytes_after_last_mark();
        live + (live as f64 * growth_percent / 100.0) as usize
    }
}

impl TriggerPolicy for OldHeuristics {
    fn name(&self) -> &'static str {
        "Old"
    }

    fn should_start_gc(&mut self, ctx: &TriggerContext) -> Trigger {
        // Nothing to start while the previous old collection is unfinished.
        if self.old_generation.state() != crate::plan::OldGenerationState::WaitingForBootstrap {
            return Trigger::Decline;
        }

        let current_usage = ctx.usage.used;
        let trigger_threshold = self.usage_trigger_threshold(ctx.options.min_old_gen_growth_percent);
        if current_usage > trigger_threshold && current_usage > ctx.options.min_old_gen_size {
            let live = self.old_generation.live_bytes_after_last_mark();
            let growth = if live == 0 {
                100.0
            } else {
                (current_usage - live) as f64 * 100.0 / live as f64
            };
            return Trigger::Start(format!(
                "Old has grown since last mark ({}) to {} (growth {:.1}%), larger than {}",
                bytes_to_formatted_string(live),
                bytes_to_formatted_string(current_usage),
                growth,
                bytes_to_formatted_string(trigger_threshold)
            ));
        }

        Trigger::Defer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::OldGenerationState;
    use crate::util::constants::BYTES_IN_MBYTE;
    use crate::util::options::Options;
    use crate::util::test_util::serial_test;
    use crate::util::truncated_seq::{TruncatedSeq, DEFAULT_ALPHA};
    use crate::vm::GenerationUsage;

    fn old_trigger(old: &Arc<OldGeneration>, used_mb: usize) -> Trigger {
        let options = Options::default();
        let times = TruncatedSeq::new(10, DEFAULT_ALPHA);
        let ctx = TriggerContext {
            usage: GenerationUsage::with_capacity(1024 * BYTES_IN_MBYTE, used_mb * BYTES_IN_MBYTE),
            gc_time_penalties: 0,
            gc_times_learned: 0,
            cycle_times: &times,
            options: &options,
        };
        OldHeuristics::new(old.clone()).should_start_gc(&ctx)
    }

    #[test]
    fn small_old_never_triggers() {
        serial_test(|| {
            let old = Arc::new(OldGeneration::new());
            assert_eq!(old_trigger(&old, 8), Trigger::Defer);
            assert!(matches!(old_trigger(&old, 17), Trigger::Start(_)));
        })
    }

    #[test]
    fn growth_over_live_triggers() {
        serial_test(|| {
            let old = Arc::new(OldGeneration::new());
            old.set_live_bytes_after_last_mark(100 * BYTES_IN_MBYTE);
            // 12.5% growth threshold: 112.5 MB.
            assert_eq!(old_trigger(&old, 112), Trigger::Defer);
            assert!(matches!(old_trigger(&old, 113), Trigger::Start(_)));
        })
    }

    #[test]
    fn in_progress_old_declines() {
        serial_test(|| {
            let old = Arc::new(OldGeneration::new());
            old.transition_to(OldGenerationState::Bootstrapping);
            assert_eq!(old_trigger(&old, 500), Trigger::Decline);
            old.transition_to(OldGenerationState::Marking);
            assert_eq!(old_trigger(&old, 500), Trigger::Decline);
        })
    }
}
