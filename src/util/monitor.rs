use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A lock and condition variable pair for threads waiting on conditions expressed by shared
/// flags.
///
/// The condition itself lives outside the lock (in a `SharedFlag`, an atomic counter, ...).  A
/// waiter evaluates it with the lock held, and a notifier takes the lock before notifying, so a
/// change made before `notify_all` is never missed.
#[derive(Default)]
pub struct Monitor {
    lock: Mutex<()>,
    cond: Condvar,
    /// Threads currently blocked in `wait_while`.
    waiters: AtomicUsize,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block while `condition` holds.
    pub fn wait_while<F>(&self, mut condition: F)
    where
        F: FnMut() -> bool,
    {
        let guard = self.lock.lock().unwrap();
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let _guard = self.cond.wait_while(guard, |_| condition()).unwrap();
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }

    /// Block while `condition` holds, but no longer than `timeout`.  Returns `true` if it timed
    /// out with the condition still holding.
    pub fn wait_while_timeout<F>(&self, timeout: Duration, mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let guard = self.lock.lock().unwrap();
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let (_guard, result) = self
            .cond
            .wait_timeout_while(guard, timeout, |_| condition())
            .unwrap();
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        result.timed_out()
    }

    /// Run `body` with the lock held, then wait once (at most `timeout` if given).  `body`
    /// returns `false` to skip the wait.
    ///
    /// For loops that must publish a request and start waiting atomically with respect to
    /// `notify_all`.
    pub fn publish_and_wait<F>(&self, timeout: Option<Duration>, body: F)
    where
        F: FnOnce() -> bool,
    {
        let guard = self.lock.lock().unwrap();
        if !body() {
            return;
        }
        self.waiters.fetch_add(1, Ordering::SeqCst);
        match timeout {
            Some(timeout) => drop(self.cond.wait_timeout(guard, timeout).unwrap()),
            None => drop(self.cond.wait(guard).unwrap()),
        }
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn notify_all(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cond.notify_all();
    }

    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }
}
