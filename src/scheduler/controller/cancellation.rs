use crate::plan::GCCause;
use crate::util::shared::SharedEnumFlag;
use bytemuck::NoUninit;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, NoUninit)]
enum CancelState {
    #[default]
    Cancellable,
    Cancelled,
}

/// The cooperative cancellation signal of the in-flight cycle.
///
/// Collection phases poll [`is_cancelled`](CancelledGC::is_cancelled) at their safe points and
/// return early when it is set.  Nothing is ever interrupted.
#[derive(Debug, Default)]
pub struct CancelledGC {
    state: SharedEnumFlag<CancelState>,
    cause: SharedEnumFlag<GCCause>,
}

impl CancelledGC {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.get() == CancelState::Cancelled
    }

    /// Cancel for `cause`.  Returns `true` if this call did it, `false` if the cycle was already
    /// cancelled.  Only the winner should act on the cancellation.
    pub fn try_cancel(&self, cause: GCCause) -> bool {
        let prev = self
            .state
            .cmpxchg(CancelState::Cancelled, CancelState::Cancellable);
        if prev == CancelState::Cancellable {
            self.cause.set(cause);
            true
        } else {
            false
        }
    }

    /// Make the next cycle cancellable again.
    pub fn clear(&self) {
        self.cause.set(GCCause::NoGc);
        self.state.set(CancelState::Cancellable);
    }

    /// The cause of the current cancellation, `GCCause::NoGc` if there is none.
    pub fn cause(&self) -> GCCause {
        self.cause.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cancel_once() {
        let cancelled = CancelledGC::new();
        assert!(!cancelled.is_cancelled());
        assert!(cancelled.try_cancel(GCCause::AllocationFailure));
        assert!(!cancelled.try_cancel(GCCause::ConcurrentGc));
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.cause(), GCCause::AllocationFailure);
        cancelled.clear();
        assert!(!cancelled.is_cancelled());
        assert_eq!(cancelled.cause(), GCCause::NoGc);
        assert!(cancelled.try_cancel(GCCause::ConcurrentGc));
    }

    #[test]
    fn concurrent_cancel_has_one_winner() {
        let cancelled = CancelledGC::new();
        let winners = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if cancelled.try_cancel(GCCause::AllocationFailureEvac) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
