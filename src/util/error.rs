//! Errors reported to the runtime.
//!
//! Collector-level failures (allocation failure, evacuation failure, metaspace exhaustion) are
//! never errors: the controller absorbs them as state transitions.  Only misuse of the service
//! lifecycle is reported here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GCControlError {
    #[error("failed to spawn the {name} thread")]
    SpawnThread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("the control and regulator threads have already been started")]
    AlreadyStarted,
    #[error("the control and regulator threads were never started")]
    NotStarted,
}

pub type GCControlResult<T> = Result<T, GCControlError>;
