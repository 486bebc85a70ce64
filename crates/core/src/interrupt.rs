//! Cooperative interruption signal.
//!
//! Blocking steps of the pipeline (a bounded lock wait, the workload itself)
//! watch an [`Interrupt`] so a shutting-down process can stop them early. An
//! interrupted workload is recorded as a failure; cleanup still runs.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Shared, cloneable interruption flag. Once triggered it stays triggered.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every waiter.
    pub fn trigger(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for up to `timeout`.
    ///
    /// Returns `true` if the wait ended because of the interrupt, `false` if
    /// the full duration elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut triggered = flag.lock().unwrap_or_else(PoisonError::into_inner);

        while !*triggered {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = cvar
                .wait_timeout(triggered, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            triggered = guard;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn untriggered_wait_runs_full_duration() {
        let interrupt = Interrupt::new();
        let started = Instant::now();

        assert!(!interrupt.wait_timeout(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn trigger_wakes_waiter_early() {
        let interrupt = Interrupt::new();
        let remote = interrupt.clone();

        let waiter = thread::spawn(move || remote.wait_timeout(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(10));
        interrupt.trigger();

        assert!(waiter.join().unwrap());
        assert!(interrupt.is_triggered());
    }

    #[test]
    fn triggered_interrupt_returns_immediately() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        assert!(interrupt.wait_timeout(Duration::from_secs(30)));
    }
}
