//! Utilities shared by the rest of the crate.

/// Requests that could not be satisfied by the allocator.
pub mod alloc_request;
/// Constants.
pub mod constants;
/// Calculation, conversion and rounding for memory related numbers.
pub mod conversions;
/// Errors reported to the runtime.
pub mod error;
/// Logger initialization.
pub mod logger;
/// Lock and condition variable pairs for threads waiting on shared flags.
pub mod monitor;
/// Runtime options.
pub mod options;
/// Lock-free single-word state shared between threads.
pub mod shared;
/// Statistics over a bounded window of samples.
pub mod truncated_seq;

#[cfg(any(test, feature = "mock_test"))]
pub mod test_util;

pub use self::alloc_request::{AllocRequest, AllocType};
