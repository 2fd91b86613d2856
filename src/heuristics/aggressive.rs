use super::{Trigger, TriggerContext, TriggerPolicy};

/// Runs cycles back to back and unloads classes in every one of them.  For stress testing.
pub struct AggressiveHeuristics;

impl TriggerPolicy for AggressiveHeuristics {
    fn name(&self) -> &'static str {
        "Aggressive"
    }

    fn should_start_gc(&mut self, _ctx: &TriggerContext) -> Trigger {
        Trigger::Start("Start next cycle immediately".to_string())
    }

    fn always_unload_classes(&self) -> bool {
        true
    }
}
