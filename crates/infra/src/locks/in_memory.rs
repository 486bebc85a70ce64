//! Process-local lock registry.
//!
//! Same contract as the Redis backend (per-key exclusivity, lease expiry,
//! idempotent release) but only shared between threads of one process.
//! Intended for tests/dev and single-instance deployments.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use joblock_core::Interrupt;

use super::{DistributedLock, LockError, LockRegistry, namespaced};

/// Upper bound on one condvar wait, so interrupts and lease expiry of the
/// current holder are noticed without a release notification.
const WAIT_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
struct Lease {
    holder: Uuid,
    expires_at: Instant,
}

#[derive(Debug)]
struct Shared {
    leases: Mutex<HashMap<String, Lease>>,
    released: Condvar,
    lease: Duration,
}

impl Shared {
    fn leases(&self) -> Result<MutexGuard<'_, HashMap<String, Lease>>, LockError> {
        self.leases
            .lock()
            .map_err(|_| LockError::Backend("lock table poisoned".to_string()))
    }

    /// Take the key for `holder` if it is free or its lease ran out.
    fn claim(leases: &mut HashMap<String, Lease>, key: &str, holder: Uuid, lease: Duration) -> bool {
        let now = Instant::now();
        let current = leases.get(key).copied();
        match current {
            Some(current) if current.holder != holder && current.expires_at > now => return false,
            Some(current) if current.holder != holder => {
                warn!(lock_key = %key, "reclaiming expired lease");
            }
            _ => {}
        }

        leases.insert(
            key.to_string(),
            Lease {
                holder,
                expires_at: now + lease,
            },
        );
        true
    }
}

/// In-memory lock registry with lease expiry.
#[derive(Debug, Clone)]
pub struct InMemoryLockRegistry {
    registry_key: String,
    shared: Arc<Shared>,
}

impl InMemoryLockRegistry {
    /// Create a registry whose keys live under `registry_key` and whose
    /// leases expire after `lease` if never released.
    pub fn new(registry_key: impl Into<String>, lease: Duration) -> Self {
        Self {
            registry_key: registry_key.into(),
            shared: Arc::new(Shared {
                leases: Mutex::new(HashMap::new()),
                released: Condvar::new(),
                lease,
            }),
        }
    }

    pub fn arc(registry_key: impl Into<String>, lease: Duration) -> Arc<Self> {
        Arc::new(Self::new(registry_key, lease))
    }

    /// Whether `key` currently has a live (unexpired) holder.
    pub fn is_locked(&self, key: &str) -> bool {
        let full = namespaced(&self.registry_key, key);
        match self.shared.leases() {
            Ok(leases) => leases
                .get(&full)
                .is_some_and(|l| l.expires_at > Instant::now()),
            Err(_) => false,
        }
    }
}

impl Default for InMemoryLockRegistry {
    fn default() -> Self {
        Self::new("joblock", Duration::from_secs(60))
    }
}

impl LockRegistry for InMemoryLockRegistry {
    fn obtain(&self, key: &str) -> Box<dyn DistributedLock> {
        Box::new(InMemoryLock {
            key: namespaced(&self.registry_key, key),
            holder: Uuid::now_v7(),
            held: false,
            shared: self.shared.clone(),
        })
    }
}

/// Handle on one key of an [`InMemoryLockRegistry`].
#[derive(Debug)]
pub struct InMemoryLock {
    key: String,
    holder: Uuid,
    held: bool,
    shared: Arc<Shared>,
}

impl DistributedLock for InMemoryLock {
    fn key(&self) -> &str {
        &self.key
    }

    fn try_acquire(&mut self) -> Result<bool, LockError> {
        let mut leases = self.shared.leases()?;
        self.held = Shared::claim(&mut leases, &self.key, self.holder, self.shared.lease);
        Ok(self.held)
    }

    fn try_acquire_for(
        &mut self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool, LockError> {
        let deadline = Instant::now() + timeout;
        let mut leases = self.shared.leases()?;

        loop {
            if Shared::claim(&mut leases, &self.key, self.holder, self.shared.lease) {
                self.held = true;
                return Ok(true);
            }
            if interrupt.is_triggered() {
                return Err(LockError::Interrupted);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }

            let wait = (deadline - now).min(WAIT_SLICE);
            leases = self
                .shared
                .released
                .wait_timeout(leases, wait)
                .map_err(|_| LockError::Backend("lock table poisoned".to_string()))?
                .0;
        }
    }

    fn release(&mut self) -> Result<(), LockError> {
        if !self.held {
            return Ok(());
        }
        self.held = false;

        let mut leases = self.shared.leases()?;
        match leases.get(&self.key) {
            Some(lease) if lease.holder == self.holder => {
                leases.remove(&self.key);
                debug!(lock_key = %self.key, "released lock");
            }
            _ => warn!(lock_key = %self.key, "lease expired before release"),
        }
        drop(leases);

        self.shared.released.notify_all();
        Ok(())
    }

    fn is_held(&self) -> bool {
        self.held
    }
}
