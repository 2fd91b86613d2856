//! Lock-free, single-word state cells shared between mutators, the controller and the regulator.
//!
//! All of them follow the same contract:
//!
//! -   Stores (`set`, `unset`, `clear`) are release stores followed by a full fence, so a thread
//!     that observes the new value also observes everything the setter wrote before.
//! -   Queries (`is_set`, `is_unset`, `get`) are acquire loads.
//! -   `try_*` operations perform a single compare-and-swap and return `true` only for the thread
//!     that performed the transition.  This is the only way a caller may assume it is exclusively
//!     responsible for the event the cell signals.
//!
//! They are plain values: they default to "unset" and are embedded directly into their owners.

use atomic::Atomic;
use bytemuck::NoUninit;
use std::sync::atomic::{fence, AtomicU32, AtomicU8, Ordering};

const UNSET: u8 = 0;
const SET: u8 = 1;

#[inline(always)]
fn release_store_fence(cell: &AtomicU8, value: u8) {
    cell.store(value, Ordering::Release);
    fence(Ordering::SeqCst);
}

/// A boolean flag.
#[derive(Debug, Default)]
pub struct SharedFlag {
    value: AtomicU8,
}

assert_eq_size!(SharedFlag, u8);

impl SharedFlag {
    pub const fn new() -> Self {
        Self {
            value: AtomicU8::new(UNSET),
        }
    }

    pub fn set(&self) {
        release_store_fence(&self.value, SET);
    }

    pub fn unset(&self) {
        release_store_fence(&self.value, UNSET);
    }

    pub fn is_set(&self) -> bool {
        self.value.load(Ordering::Acquire) == SET
    }

    pub fn is_unset(&self) -> bool {
        self.value.load(Ordering::Acquire) == UNSET
    }

    pub fn set_cond(&self, val: bool) {
        if val {
            self.set();
        } else {
            self.unset();
        }
    }

    /// Transition from unset to set.  Returns `true` if this thread made the transition.
    pub fn try_set(&self) -> bool {
        if self.is_set() {
            return false;
        }
        self.value
            .compare_exchange(UNSET, SET, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Transition from set to unset.  Returns `true` if this thread made the transition.
    pub fn try_unset(&self) -> bool {
        if !self.is_set() {
            return false;
        }
        self.value
            .compare_exchange(SET, UNSET, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A small set of independently settable bits.
#[derive(Debug, Default)]
pub struct SharedBitmap {
    value: AtomicU8,
}

impl SharedBitmap {
    pub const fn new() -> Self {
        Self {
            value: AtomicU8::new(0),
        }
    }

    /// Set all the bits in `mask`.
    pub fn set(&self, mask: u8) {
        let mut old = self.value.load(Ordering::Acquire);
        loop {
            if old & mask == mask {
                // Already set.
                return;
            }
            match self.value.compare_exchange(
                old,
                old | mask,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(witness) => old = witness,
            }
        }
    }

    /// Clear all the bits in `mask`.
    pub fn unset(&self, mask: u8) {
        let mut old = self.value.load(Ordering::Acquire);
        loop {
            if old & mask == 0 {
                // Already unset.
                return;
            }
            match self.value.compare_exchange(
                old,
                old & !mask,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(witness) => old = witness,
            }
        }
    }

    /// Clear every bit.
    pub fn clear(&self) {
        release_store_fence(&self.value, 0);
    }

    /// Is any bit in `mask` set?
    pub fn is_set(&self, mask: u8) -> bool {
        !self.is_unset(mask)
    }

    /// Are all the bits in `mask` set?
    pub fn is_set_exactly(&self, mask: u8) -> bool {
        debug_assert!(mask != 0);
        self.value.load(Ordering::Acquire) & mask == mask
    }

    /// Is every bit in `mask` clear?
    pub fn is_unset(&self, mask: u8) -> bool {
        self.value.load(Ordering::Acquire) & mask == 0
    }

    pub fn is_clear(&self) -> bool {
        self.value.load(Ordering::Acquire) == 0
    }

    pub fn set_cond(&self, mask: u8, val: bool) {
        if val {
            self.set(mask);
        } else {
            self.unset(mask);
        }
    }

    pub fn raw_value(&self) -> u8 {
        self.value.load(Ordering::Acquire)
    }
}

/// A single-word cell holding a value of a small `Copy` enum.
///
/// `T` must be `NoUninit` (use `#[repr(u8)]` and derive it) so that the cell can be updated with
/// one atomic instruction.
pub struct SharedEnumFlag<T: NoUninit> {
    value: Atomic<T>,
}

impl<T: NoUninit> SharedEnumFlag<T> {
    pub const fn new(initial: T) -> Self {
        Self {
            value: Atomic::new(initial),
        }
    }

    pub fn set(&self, value: T) {
        self.value.store(value, Ordering::Release);
        fence(Ordering::SeqCst);
    }

    pub fn get(&self) -> T {
        self.value.load(Ordering::Acquire)
    }

    /// Store `new` if the current value is `expected`.  Returns the value observed before the
    /// operation, so the caller performed the transition iff the result equals `expected`.
    pub fn cmpxchg(&self, new: T, expected: T) -> T {
        match self
            .value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(prev) | Err(prev) => prev,
        }
    }

    /// Unconditionally store `new` and return the previous value.
    pub fn xchg(&self, new: T) -> T {
        self.value.swap(new, Ordering::AcqRel)
    }
}

impl<T: NoUninit + Default> Default for SharedEnumFlag<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: NoUninit + std::fmt::Debug> std::fmt::Debug for SharedEnumFlag<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedEnumFlag").field(&self.get()).finish()
    }
}

/// A fixed number of tokens that can be acquired one at a time, or claimed all at once.
#[derive(Debug, Default)]
pub struct SharedSemaphore {
    value: AtomicU32,
}

impl SharedSemaphore {
    pub const fn new(tokens: u32) -> Self {
        Self {
            value: AtomicU32::new(tokens),
        }
    }

    /// Take one token.  Returns `false` if none is left.
    pub fn try_acquire(&self) -> bool {
        let mut old = self.value.load(Ordering::Acquire);
        loop {
            if old == 0 {
                return false;
            }
            match self.value.compare_exchange(
                old,
                old - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(witness) => old = witness,
            }
        }
    }

    /// Take every remaining token so that no later `try_acquire` succeeds.
    /// Returns `true` if there were tokens left.
    pub fn claim_all(&self) -> bool {
        self.value.swap(0, Ordering::AcqRel) != 0
    }

    pub fn available(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    #[test]
    fn flag_defaults_to_unset() {
        let flag = SharedFlag::default();
        assert!(flag.is_unset());
        assert!(!flag.is_set());
    }

    #[test]
    fn flag_try_set_only_once() {
        let flag = SharedFlag::new();
        assert!(flag.try_set());
        assert!(!flag.try_set());
        assert!(flag.is_set());
        assert!(flag.try_unset());
        assert!(!flag.try_unset());
        assert!(flag.is_unset());
    }

    #[test]
    fn flag_set_cond() {
        let flag = SharedFlag::new();
        flag.set_cond(true);
        assert!(flag.is_set());
        flag.set_cond(false);
        assert!(flag.is_unset());
    }

    #[test]
    fn flag_single_winner_per_half_cycle() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 200;
        let flag = SharedFlag::new();
        let barrier = Barrier::new(THREADS);
        let winners = AtomicUsize::new(0);

        for _ in 0..ROUNDS {
            winners.store(0, Ordering::SeqCst);
            std::thread::scope(|scope| {
                for _ in 0..THREADS {
                    scope.spawn(|| {
                        barrier.wait();
                        if flag.try_set() {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
            });
            assert_eq!(winners.load(Ordering::SeqCst), 1);
            assert!(flag.is_set());

            winners.store(0, Ordering::SeqCst);
            std::thread::scope(|scope| {
                for _ in 0..THREADS {
                    scope.spawn(|| {
                        barrier.wait();
                        if flag.try_unset() {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
            });
            assert_eq!(winners.load(Ordering::SeqCst), 1);
            assert!(flag.is_unset());
        }
    }

    const BIT_A: u8 = 1 << 0;
    const BIT_B: u8 = 1 << 1;
    const BIT_C: u8 = 1 << 2;

    #[test]
    fn bitmap_any_and_exactly() {
        let bitmap = SharedBitmap::new();
        assert!(bitmap.is_clear());
        bitmap.set(BIT_A);
        assert!(bitmap.is_set(BIT_A));
        assert!(bitmap.is_set(BIT_A | BIT_B));
        assert!(!bitmap.is_set_exactly(BIT_A | BIT_B));
        bitmap.set(BIT_B);
        assert!(bitmap.is_set_exactly(BIT_A | BIT_B));
        assert!(bitmap.is_unset(BIT_C));
        bitmap.unset(BIT_A);
        assert!(bitmap.is_unset(BIT_A));
        assert!(bitmap.is_set(BIT_B));
        bitmap.set_cond(BIT_C, true);
        assert_eq!(bitmap.raw_value(), BIT_B | BIT_C);
        bitmap.clear();
        assert!(bitmap.is_clear());
    }

    #[test]
    fn bitmap_concurrent_bits_do_not_interfere() {
        let bitmap = SharedBitmap::new();
        std::thread::scope(|scope| {
            for bit in 0..8u8 {
                let bitmap = &bitmap;
                scope.spawn(move || {
                    for _ in 0..1000 {
                        bitmap.set(1 << bit);
                        bitmap.unset(1 << bit);
                    }
                    bitmap.set(1 << bit);
                });
            }
        });
        assert_eq!(bitmap.raw_value(), 0xff);
    }

    #[repr(u8)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default, NoUninit)]
    enum Color {
        #[default]
        Red,
        Green,
        Blue,
    }

    #[test]
    fn enum_flag_cmpxchg_reports_previous_value() {
        let flag = SharedEnumFlag::<Color>::default();
        assert_eq!(flag.get(), Color::Red);
        assert_eq!(flag.cmpxchg(Color::Green, Color::Red), Color::Red);
        assert_eq!(flag.get(), Color::Green);
        // Expected value does not match: no change.
        assert_eq!(flag.cmpxchg(Color::Blue, Color::Red), Color::Green);
        assert_eq!(flag.get(), Color::Green);
        assert_eq!(flag.xchg(Color::Blue), Color::Green);
        flag.set(Color::Red);
        assert_eq!(flag.get(), Color::Red);
    }

    #[test]
    fn semaphore_tokens() {
        let sem = SharedSemaphore::new(2);
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());

        let sem = SharedSemaphore::new(3);
        assert!(sem.try_acquire());
        assert!(sem.claim_all());
        assert_eq!(sem.available(), 0);
        assert!(!sem.try_acquire());
        assert!(!sem.claim_all());
    }

    #[test]
    fn semaphore_never_over_acquires() {
        let sem = SharedSemaphore::new(5);
        let acquired = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    while sem.try_acquire() {
                        acquired.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(acquired.load(Ordering::SeqCst), 5);
    }
}
