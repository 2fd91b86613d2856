use crate::util::options::Options;
use bytemuck::NoUninit;
use enum_map::Enum;
use strum_macros::{Display, IntoStaticStr};

/// Why a collection was requested.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, NoUninit, Enum, Display, IntoStaticStr)]
pub enum GCCause {
    /// No request.  The resting value of the controller's request slot.
    #[default]
    #[strum(to_string = "No GC")]
    NoGc,
    /// The application asked for a collection.
    #[strum(to_string = "System.gc()")]
    JavaLangSystemGc,
    #[strum(to_string = "Diagnostic Command")]
    DiagnosticCommand,
    #[strum(to_string = "Heap Inspection Initiated GC")]
    HeapInspection,
    #[strum(to_string = "Heap Dump Initiated GC")]
    HeapDump,
    #[strum(to_string = "WhiteBox Initiated Full GC")]
    WhiteBoxFullGc,
    /// Class metadata space is exhausted.
    #[strum(to_string = "Metadata GC Threshold")]
    MetadataGcThreshold,
    #[strum(to_string = "Allocation Failure")]
    AllocationFailure,
    #[strum(to_string = "Allocation Failure During Evacuation")]
    AllocationFailureEvac,
    /// The regulator (or a heuristic) asked for a concurrent cycle.
    #[strum(to_string = "Concurrent GC")]
    ConcurrentGc,
    #[strum(to_string = "Upgrade To Full GC")]
    UpgradeToFullGc,
    #[strum(to_string = "Stopping VM")]
    StopVm,
}

impl GCCause {
    /// Requested by the user or a serviceability tool.
    pub fn is_explicit(self) -> bool {
        matches!(
            self,
            GCCause::JavaLangSystemGc
                | GCCause::DiagnosticCommand
                | GCCause::HeapInspection
                | GCCause::HeapDump
                | GCCause::WhiteBoxFullGc
        )
    }

    pub fn is_allocation_failure(self) -> bool {
        matches!(
            self,
            GCCause::AllocationFailure | GCCause::AllocationFailureEvac
        )
    }

    /// Requested by the runtime itself, e.g. when metadata space is exhausted.
    pub fn is_implicit(self) -> bool {
        self != GCCause::NoGc
            && self != GCCause::ConcurrentGc
            && !self.is_allocation_failure()
            && !self.is_explicit()
    }

    /// Goes through `request_gc` and blocks the requester until a cycle completes.
    pub fn is_requested(self) -> bool {
        self.is_explicit() || self.is_implicit()
    }

    pub fn should_handle_requested(self, options: &Options) -> bool {
        debug_assert!(self.is_requested());
        !(self.is_explicit() && options.ignore_system_gc)
    }

    /// Should a requested collection be a full GC rather than a concurrent cycle?
    pub fn should_run_full(self, options: &Options) -> bool {
        if self.is_explicit() {
            !options.explicit_gc_invokes_concurrent
        } else {
            debug_assert!(self.is_implicit());
            !options.implicit_gc_invokes_concurrent
        }
    }
}
