//! Distributed lock boundary.
//!
//! A [`LockRegistry`] hands out per-key [`DistributedLock`] handles. Obtaining
//! a handle does not acquire anything; exclusivity is taken with
//! `try_acquire` (non-blocking) or `try_acquire_for` (bounded wait) and given
//! back with `release`.
//!
//! Backends guarantee:
//! - at most one holder per key across every process sharing the backend
//! - leases expire on their own after the configured duration, so a crashed
//!   holder cannot keep a key forever
//! - `release` on a handle that never acquired (or already released) is a
//!   no-op, so cleanup code can call it unconditionally

use std::time::Duration;

use joblock_core::Interrupt;

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_lock;

pub use in_memory::{InMemoryLock, InMemoryLockRegistry};
#[cfg(feature = "redis")]
pub use redis_lock::{RedisLock, RedisLockRegistry};

/// Lock backend error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// A blocking wait was interrupted before it could acquire.
    #[error("lock wait interrupted")]
    Interrupted,

    /// The backend could not be reached or rejected the command.
    #[error("lock backend error: {0}")]
    Backend(String),
}

/// Source of per-key lock handles.
pub trait LockRegistry: Send + Sync {
    /// Return a handle scoped to `key`. Does not acquire.
    fn obtain(&self, key: &str) -> Box<dyn DistributedLock>;
}

/// Handle on one key of a [`LockRegistry`].
pub trait DistributedLock: Send {
    /// Fully-qualified key (registry namespace included).
    fn key(&self) -> &str;

    /// Attempt to become the exclusive holder without waiting.
    fn try_acquire(&mut self) -> Result<bool, LockError>;

    /// Attempt to become the exclusive holder, waiting up to `timeout`.
    ///
    /// Fails with [`LockError::Interrupted`] if `interrupt` fires first.
    fn try_acquire_for(
        &mut self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool, LockError>;

    /// Give up exclusivity. A no-op when not held.
    fn release(&mut self) -> Result<(), LockError>;

    /// Whether this handle currently believes it holds the key.
    fn is_held(&self) -> bool;
}

impl<R: LockRegistry + ?Sized> LockRegistry for std::sync::Arc<R> {
    fn obtain(&self, key: &str) -> Box<dyn DistributedLock> {
        (**self).obtain(key)
    }
}

/// Join a registry namespace and a per-job key.
pub(crate) fn namespaced(registry_key: &str, key: &str) -> String {
    if registry_key.is_empty() {
        key.to_string()
    } else {
        format!("{registry_key}:{key}")
    }
}
