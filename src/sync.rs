//! Counting semaphore that bounds how many git subprocesses run at once.

use crate::cancel::{CancelToken, StopReason};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// Upper bound on how long a cancellable waiter sleeps between token checks.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(25);

/// A counting semaphore for limiting concurrency.
///
/// Batch reads and poll passes share one of these per owner, so a burst of
/// repositories never turns into an unbounded burst of `git` processes.
/// Permits are handed out as RAII [`SemaphoreGuard`]s.
#[derive(Debug, Clone)]
pub struct Semaphore {
    state: Arc<(Mutex<usize>, Condvar)>,
}

/// Releases its permit on drop, including during unwinding.
#[derive(Debug)]
pub struct SemaphoreGuard {
    state: Arc<(Mutex<usize>, Condvar)>,
}

impl Semaphore {
    /// Create a semaphore with `permits` slots. Zero is treated as one.
    pub fn new(permits: usize) -> Self {
        Self {
            state: Arc::new((Mutex::new(permits.max(1)), Condvar::new())),
        }
    }

    /// Block until a permit is available
    pub fn acquire(&self) -> SemaphoreGuard {
        let (lock, cvar) = &*self.state;
        let mut available = lock_permits(lock);
        while *available == 0 {
            available = cvar.wait(available).unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        SemaphoreGuard {
            state: Arc::clone(&self.state),
        }
    }

    /// Block until a permit is available or `token` stops, whichever is first
    pub fn acquire_until(&self, token: &CancelToken) -> Result<SemaphoreGuard, StopReason> {
        let (lock, cvar) = &*self.state;
        let mut available = lock_permits(lock);
        while *available == 0 {
            if let Some(reason) = token.stop_reason() {
                return Err(reason);
            }
            let wait = token
                .remaining()
                .map_or(CANCEL_CHECK_INTERVAL, |left| left.min(CANCEL_CHECK_INTERVAL));
            available = cvar
                .wait_timeout(available, wait)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        // A permit that frees up after the token stopped is not taken.
        if let Some(reason) = token.stop_reason() {
            return Err(reason);
        }
        *available -= 1;
        Ok(SemaphoreGuard {
            state: Arc::clone(&self.state),
        })
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        *lock_permits(&self.state.0)
    }
}

impl Drop for SemaphoreGuard {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.state;
        let mut available = lock_permits(lock);
        *available += 1;
        cvar.notify_one();
    }
}

fn lock_permits(lock: &Mutex<usize>) -> MutexGuard<'_, usize> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_semaphore_limits_concurrency() {
        let sem = Semaphore::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let sem = sem.clone();
                let counter = Arc::clone(&counter);
                let max_concurrent = Arc::clone(&max_concurrent);
                thread::spawn(move || {
                    let _guard = sem.acquire();
                    let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    max_concurrent.fetch_max(current, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    counter.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(max_concurrent.load(Ordering::SeqCst) <= 2);
        assert_eq!(sem.available(), 2);
    }

    #[test]
    fn test_acquire_until_gives_up_on_cancel() {
        let sem = Semaphore::new(1);
        let _held = sem.acquire();
        let (handle, token) = CancelToken::new();

        let waiter = {
            let sem = sem.clone();
            thread::spawn(move || sem.acquire_until(&token).map(drop))
        };
        thread::sleep(Duration::from_millis(30));
        handle.cancel();

        assert_eq!(waiter.join().unwrap(), Err(StopReason::Cancelled));
    }

    #[test]
    fn test_acquire_until_respects_deadline() {
        let sem = Semaphore::new(1);
        let _held = sem.acquire();
        let token = CancelToken::background().with_timeout(Duration::from_millis(40));
        assert_eq!(
            sem.acquire_until(&token).map(drop),
            Err(StopReason::DeadlineExceeded)
        );
    }

    #[test]
    fn test_acquire_until_refuses_stopped_token_even_with_free_permit() {
        let sem = Semaphore::new(1);
        let token = CancelToken::background().with_timeout(Duration::ZERO);
        assert!(sem.acquire_until(&token).is_err());
        assert_eq!(sem.available(), 1);
    }
}
