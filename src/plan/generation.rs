use crate::util::shared::SharedEnumFlag;
use bytemuck::NoUninit;
use enum_map::Enum;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum_macros::Display;

/// The heap partition a cycle or a heuristics instance works on.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, NoUninit, Enum, Display)]
pub enum GenerationType {
    /// The whole heap, when the collector is not generational.
    #[default]
    #[strum(to_string = "")]
    NonGen,
    #[strum(to_string = "Young")]
    Young,
    #[strum(to_string = "Old")]
    Old,
    #[strum(to_string = "Global")]
    Global,
}

impl GenerationType {
    pub fn is_young(self) -> bool {
        self == GenerationType::Young
    }

    pub fn is_old(self) -> bool {
        self == GenerationType::Old
    }

    /// Covers the whole heap.
    pub fn is_global(self) -> bool {
        matches!(self, GenerationType::NonGen | GenerationType::Global)
    }
}

/// Progress of the old generation through its multi-cycle collection.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, NoUninit, Display)]
pub enum OldGenerationState {
    /// Idle.  The next old request starts a bootstrap cycle.
    #[default]
    WaitingForBootstrap,
    /// A young cycle is preparing old marking (seeding it with roots).
    Bootstrapping,
    /// Old marking is in progress and may be preempted by young cycles.
    Marking,
    /// Dead old objects are being coalesced and filled.
    Filling,
}

impl OldGenerationState {
    /// Old marking has been started and not yet finished.
    pub fn is_marking_in_progress(self) -> bool {
        matches!(
            self,
            OldGenerationState::Bootstrapping | OldGenerationState::Marking
        )
    }

    /// Work that the controller resumes when idle.
    pub fn has_unfinished_work(self) -> bool {
        matches!(
            self,
            OldGenerationState::Marking | OldGenerationState::Filling
        )
    }

    pub fn can_transition_to(self, new_state: OldGenerationState) -> bool {
        use OldGenerationState::*;
        match (self, new_state) {
            (WaitingForBootstrap, Bootstrapping) => true,
            (Bootstrapping, Marking) => true,
            (Marking, Filling) => true,
            (Filling, WaitingForBootstrap) => true,
            // A full GC abandons whatever old work is in flight.
            (_, WaitingForBootstrap) => true,
            _ => false,
        }
    }
}

/// The state of the old generation shared by the control thread, which drives it, and the old
/// heuristics, which read it.
#[derive(Debug, Default)]
pub struct OldGeneration {
    state: SharedEnumFlag<OldGenerationState>,
    /// Old usage right after the last completed old mark.
    live_bytes_after_last_mark: AtomicUsize,
}

impl OldGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OldGenerationState {
        self.state.get()
    }

    /// Only the control thread changes the state.
    pub fn transition_to(&self, new_state: OldGenerationState) {
        let current = self.state.get();
        assert!(
            current.can_transition_to(new_state),
            "Invalid old generation state transition from {} to {}",
            current,
            new_state
        );
        if current != new_state {
            debug!("Old generation transition from {} to {}", current, new_state);
            self.state.set(new_state);
        }
    }

    /// Drop any old work in flight.  A full GC has collected the old generation anyway.
    pub fn abandon(&self) {
        if self.state() != OldGenerationState::WaitingForBootstrap {
            info!("Abandon old generation work in state {}", self.state());
            self.transition_to(OldGenerationState::WaitingForBootstrap);
        }
    }

    pub fn is_bootstrapping(&self) -> bool {
        self.state() == OldGenerationState::Bootstrapping
    }

    pub fn is_marking_in_progress(&self) -> bool {
        self.state().is_marking_in_progress()
    }

    pub fn has_unfinished_work(&self) -> bool {
        self.state().has_unfinished_work()
    }

    pub fn live_bytes_after_last_mark(&self) -> usize {
        self.live_bytes_after_last_mark.load(Ordering::Relaxed)
    }

    pub fn set_live_bytes_after_last_mark(&self, bytes: usize) {
        self.live_bytes_after_last_mark
            .store(bytes, Ordering::Relaxed);
    }
}
