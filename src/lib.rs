//! gc-control is the control plane of a concurrent, region-based garbage collector.
//!
//! It decides *when* a collection cycle starts and *which* kind of cycle runs:
//! * a concurrent cycle, running alongside mutators,
//! * a degenerated cycle, finishing a cancelled concurrent cycle with mutators stopped,
//! * a full cycle, the stop-the-world last resort,
//! * and, with generations, old-generation bootstrap and marking that young cycles may preempt.
//!
//! The collection algorithms themselves belong to the runtime, which plugs them in through the
//! [`vm::Heap`] and [`vm::Collection`] traits.  The runtime creates a [`GCControl`] through a
//! [`GCControlBuilder`] and talks to it through [`memory_manager`].
//!
//! Internally there are two threads.  The *control thread*
//! ([`scheduler::Controller`]) owns the cycle state machine; the *regulator*
//! ([`scheduler::Regulator`]) polls the per-generation [`heuristics`] and turns their decisions
//! into requests.  Mutators only ever set shared flags and, when they have to, wait on monitors.

#[cfg(any(test, feature = "mock_test"))]
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate probe;
#[macro_use]
extern crate static_assertions;

pub mod build_info;
mod gc_control;
pub use gc_control::GCControl;
pub use gc_control::GCControlBuilder;

pub mod heuristics;
pub mod memory_manager;
pub mod plan;
pub mod scheduler;
pub mod util;
pub mod vm;

#[cfg(test)]
mod tests;
