//! Exclusive lock with interruptible acquisition
//!
//! Pairs a value with the one lock that guards it. Acquisition either
//! succeeds, or aborts with `Interrupted` when the caller's token is raised
//! while waiting. An aborted wait never leaves the lock held.

use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long one bounded wait lasts before the interrupt token is re-checked.
///
/// parking_lot has no natively interruptible acquisition, so `lock` waits in
/// bounded slices and checks the token between them.
const WAIT_SLICE: Duration = Duration::from_millis(1);

/// Cloneable cancellation token shared between a blocked caller and
/// whoever interrupts it.
///
/// Raising the token makes every in-flight and future interruptible
/// acquisition fail with `Interrupted` until `clear` is called.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    #[must_use]
    pub fn new() -> Self {
        Self {
            raised: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// A value reachable only through its exclusive lock.
pub struct Guarded<T> {
    inner: Mutex<T>,
}

impl<T> Guarded<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Acquire the lock, aborting with `Interrupted` if `intr` is raised
    /// while waiting.
    ///
    /// The fast path never touches the token: an uncontended lock is
    /// acquired even when the token is already raised, matching the
    /// try-then-sleep shape of an interruptible mutex acquisition.
    ///
    /// # Errors
    /// Returns `VfsError::Interrupted` if the token is raised before the
    /// lock becomes available.
    pub fn lock(&self, intr: &Interrupt) -> crate::error::Result<MutexGuard<'_, T>> {
        if let Some(guard) = self.inner.try_lock() {
            return Ok(guard);
        }
        loop {
            if intr.is_raised() {
                tracing::debug!("lock wait aborted by interrupt");
                return Err(crate::error::VfsError::Interrupted);
            }
            if let Some(guard) = self.inner.try_lock_for(WAIT_SLICE) {
                return Ok(guard);
            }
        }
    }

    /// Acquire the lock unconditionally.
    ///
    /// Reserved for short, bounded critical sections where no caller-held
    /// lock can extend the wait.
    pub fn lock_blocking(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VfsError;
    use std::thread;

    #[test]
    fn test_lock_and_mutate() {
        let guarded = Guarded::new(0u32);
        let intr = Interrupt::new();
        *guarded.lock(&intr).unwrap() = 7;
        assert_eq!(*guarded.lock(&intr).unwrap(), 7);
    }

    #[test]
    fn test_uncontended_lock_ignores_raised_token() {
        let guarded = Guarded::new(());
        let intr = Interrupt::new();
        intr.raise();
        assert!(guarded.lock(&intr).is_ok());
    }

    #[test]
    fn test_raise_aborts_blocked_wait() {
        let guarded = Arc::new(Guarded::new(()));
        let intr = Interrupt::new();

        let held = guarded.lock_blocking();

        let waiter = {
            let guarded = Arc::clone(&guarded);
            let intr = intr.clone();
            thread::spawn(move || guarded.lock(&intr).map(|_| ()))
        };

        thread::sleep(Duration::from_millis(20));
        intr.raise();
        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(VfsError::Interrupted)));

        // The holder's guard is still valid and releases cleanly.
        drop(held);
        intr.clear();
        assert!(guarded.lock(&intr).is_ok());
    }

    #[test]
    fn test_wait_succeeds_once_holder_releases() {
        let guarded = Arc::new(Guarded::new(1u32));
        let intr = Interrupt::new();

        let held = guarded.lock_blocking();
        let waiter = {
            let guarded = Arc::clone(&guarded);
            let intr = intr.clone();
            thread::spawn(move || guarded.lock(&intr).map(|guard| *guard))
        };

        thread::sleep(Duration::from_millis(10));
        drop(held);
        assert_eq!(waiter.join().unwrap().unwrap(), 1);
    }
}
