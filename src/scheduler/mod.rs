//! The two service threads: the control thread, which runs cycles, and the regulator, which
//! decides when to ask for them.

pub mod controller;
pub mod regulator;

pub use controller::Controller;
pub use controller::{CancelledGC, DegenerationPoint, GCMode};
pub use regulator::Regulator;
