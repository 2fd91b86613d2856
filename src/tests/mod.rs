// Scenario tests that run the control and regulator threads against the mock runtime.

pub(crate) mod mock_test_prelude {
    pub use crate::plan::{GCCause, GenerationType, OldGenerationState};
    pub use crate::scheduler::regulator::RegulationMode;
    pub use crate::scheduler::{CancelledGC, DegenerationPoint, GCMode};
    pub use crate::util::alloc_request::AllocRequest;
    pub use crate::util::constants::BYTES_IN_MBYTE;
    pub use crate::util::error::GCControlError;
    pub use crate::util::test_util::mock_method::*;
    pub use crate::util::test_util::mock_vm::*;
    pub use crate::util::test_util::{panic_after, wait_until};
    pub use crate::vm::{ConcurrentOutcome, CycleRequest, DegeneratedOutcome, GenerationUsage};
    pub use std::sync::{Arc, Mutex};

    /// Long enough for any single step of a scenario on a loaded machine.
    pub const TIMEOUT_MILLIS: u64 = 10_000;

    /// No periodic trigger gets in the way of the scenario.
    pub const QUIET: &[(&str, &str)] = &[
        ("heuristics", "static"),
        ("guaranteed_gc_interval", "0"),
        ("guaranteed_young_gc_interval", "0"),
        ("guaranteed_old_gc_interval", "0"),
    ];

    /// `QUIET` plus `extra`.
    pub fn quiet_with<'a>(extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        QUIET.iter().chain(extra.iter()).copied().collect()
    }

    /// Record every request a mocked cycle is called with.
    pub fn recorder() -> Arc<Mutex<Vec<CycleRequest>>> {
        Arc::new(Mutex::new(vec![]))
    }
}

mod mock_test_lifecycle;
