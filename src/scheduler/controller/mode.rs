use bytemuck::NoUninit;
use enum_map::Enum;
use strum_macros::Display;

/// What the control thread is doing.  Only the control thread changes it.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, NoUninit, Display)]
pub enum GCMode {
    /// Idle, waiting for a request.
    #[default]
    #[strum(to_string = "idle")]
    None,
    #[strum(to_string = "normal")]
    ConcurrentNormal,
    #[strum(to_string = "degenerated")]
    StwDegenerated,
    #[strum(to_string = "full")]
    StwFull,
    /// A young cycle that also prepares old marking.
    #[strum(to_string = "bootstrap")]
    BootstrappingOld,
    /// Old marking or filling, preemptible by young cycles.
    #[strum(to_string = "servicing old")]
    ServicingOld,
    /// The control loop has exited.  No cycle runs after this.
    #[strum(to_string = "stopped")]
    Stopped,
}

// Both live in a `SharedEnumFlag`, which needs them to fit in a byte.
const_assert_eq!(std::mem::size_of::<GCMode>(), 1);
const_assert_eq!(std::mem::size_of::<DegenerationPoint>(), 1);

/// Where a concurrent cycle was when it was cancelled, so that the degenerated cycle can pick up
/// from there instead of starting over.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, NoUninit, Enum, Display)]
pub enum DegenerationPoint {
    #[default]
    #[strum(to_string = "<UNSET>")]
    Unset,
    /// No cycle was running: the degenerated cycle starts from scratch.
    #[strum(to_string = "Outside of Cycle")]
    OutsideCycle,
    #[strum(to_string = "Roots")]
    Roots,
    #[strum(to_string = "Mark")]
    Mark,
    #[strum(to_string = "Evacuation")]
    Evac,
    #[strum(to_string = "Update References")]
    UpdateRefs,
}
