use super::static_heuristics::min_free_trigger;
use super::{Trigger, TriggerContext, TriggerPolicy};
use crate::util::conversions::{bytes_to_formatted_string, percentage};

/// Keeps the footprint small: starts a cycle whenever `allocation_threshold` percent of the
/// capacity has been allocated since the last one.
pub struct CompactHeuristics;

impl TriggerPolicy for CompactHeuristics {
    fn name(&self) -> &'static str {
        "Compact"
    }

    fn should_start_gc(&mut self, ctx: &TriggerContext) -> Trigger {
        if let Some(trigger) = min_free_trigger(ctx) {
            return trigger;
        }

        let threshold_bytes_allocated =
            percentage(ctx.usage.soft_max_capacity, ctx.options.allocation_threshold);
        let bytes_allocated = ctx.usage.bytes_allocated_since_gc_start;
        if bytes_allocated > threshold_bytes_allocated {
            return Trigger::Start(format!(
                "Allocated since last cycle ({}) is larger than allocation threshold ({})",
                bytes_to_formatted_string(bytes_allocated),
                bytes_to_formatted_string(threshold_bytes_allocated)
            ));
        }

        Trigger::Defer
    }
}
