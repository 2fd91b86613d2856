use super::{Trigger, TriggerContext, TriggerPolicy};
use crate::util::conversions::{bytes_to_formatted_string, percentage};

/// Starts a cycle only when free memory drops below `min_free_threshold`.
pub struct StaticHeuristics;

/// The trigger every size-based strategy starts with.
pub(super) fn min_free_trigger(ctx: &TriggerContext) -> Option<Trigger> {
    let capacity = ctx.usage.soft_max_capacity;
    let available = ctx.usage.soft_available;
    let threshold_available = percentage(capacity, ctx.options.min_free_threshold);
    if available < threshold_available {
        Some(Trigger::Start(format!(
            "Free ({}) is below minimum threshold ({})",
            bytes_to_formatted_string(available),
            bytes_to_formatted_string(threshold_available)
        )))
    } else {
        None
    }
}

impl TriggerPolicy for StaticHeuristics {
    fn name(&self) -> &'static str {
        "Static"
    }

    fn should_start_gc(&mut self, ctx: &TriggerContext) -> Trigger {
        min_free_trigger(ctx).unwrap_or(Trigger::Defer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::BYTES_IN_MBYTE;
    use crate::util::options::Options;
    use crate::util::test_util::serial_test;
    use crate::util::truncated_seq::{TruncatedSeq, DEFAULT_ALPHA};
    use crate::vm::GenerationUsage;

    #[test]
    fn triggers_below_min_free() {
        serial_test(|| {
            let options = Options::default();
            let times = TruncatedSeq::new(10, DEFAULT_ALPHA);
            let mut ctx = TriggerContext {
                usage: GenerationUsage::with_capacity(100 * BYTES_IN_MBYTE, 50 * BYTES_IN_MBYTE),
                gc_time_penalties: 0,
                gc_times_learned: 0,
                cycle_times: &times,
                options: &options,
            };
            assert_eq!(StaticHeuristics.should_start_gc(&ctx), Trigger::Defer);
            ctx.usage = GenerationUsage::with_capacity(100 * BYTES_IN_MBYTE, 95 * BYTES_IN_MBYTE);
            assert!(matches!(StaticHeuristics.should_start_gc(&ctx), Trigger::Start(_)));
        })
    }
}
