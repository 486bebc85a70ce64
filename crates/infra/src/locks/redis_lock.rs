//! Redis-backed distributed lock registry.
//!
//! Shared by every service instance pointed at the same Redis:
//!
//! - **Acquire**: `SET <key> <holder> NX PX <lease_ms>`; succeeds only if the key
//!   is absent, and the key expires by itself after the lease
//! - **Bounded wait**: repeat the acquire every `poll_interval` until it succeeds,
//!   the timeout elapses, or the interrupt fires
//! - **Release**: compare-and-delete script, so a holder whose lease already
//!   expired never deletes a lease someone else has taken since
//! - **Keys**: `<registry_key>:<job id>` (e.g. `joblock:42`)

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use joblock_core::Interrupt;

use super::{DistributedLock, LockError, LockRegistry, namespaced};

/// Default interval between acquire attempts during a bounded wait.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Deletes the key only while it still carries our holder token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

#[derive(Debug, Clone)]
pub struct RedisLockRegistry {
    client: Arc<redis::Client>,
    registry_key: String,
    lease: Duration,
    poll_interval: Duration,
}

impl RedisLockRegistry {
    /// Create a new Redis lock registry.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `registry_key` - namespace prefixed to every lock key
    /// * `lease` - expiry applied to a lock that is never released
    pub fn new(
        redis_url: impl AsRef<str>,
        registry_key: impl Into<String>,
        lease: Duration,
    ) -> Result<Self, LockError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            registry_key: registry_key.into(),
            lease,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

}

impl LockRegistry for RedisLockRegistry {
    fn obtain(&self, key: &str) -> Box<dyn DistributedLock> {
        Box::new(RedisLock {
            client: self.client.clone(),
            key: namespaced(&self.registry_key, key),
            holder: Uuid::now_v7().to_string(),
            lease_ms: self.lease.as_millis().max(1) as u64,
            poll_interval: self.poll_interval,
            held: false,
        })
    }
}

/// Handle on one key of a [`RedisLockRegistry`].
#[derive(Debug)]
pub struct RedisLock {
    client: Arc<redis::Client>,
    key: String,
    holder: String,
    lease_ms: u64,
    poll_interval: Duration,
    held: bool,
}

impl RedisLock {
    fn connection(&self) -> Result<redis::Connection, LockError> {
        self.client
            .get_connection()
            .map_err(|e| LockError::Backend(format!("connection failed: {e}")))
    }

    fn set_nx(&self, conn: &mut redis::Connection) -> Result<bool, LockError> {
        // Reply is "OK" when set, nil when the key already exists.
        let reply: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&self.holder)
            .arg("NX")
            .arg("PX")
            .arg(self.lease_ms)
            .query(conn)
            .map_err(|e| LockError::Backend(format!("SET NX failed: {e}")))?;
        Ok(reply.is_some())
    }
}

impl DistributedLock for RedisLock {
    fn key(&self) -> &str {
        &self.key
    }

    #[instrument(skip(self), fields(lock_key = %self.key), err)]
    fn try_acquire(&mut self) -> Result<bool, LockError> {
        // SET NX answers nil for our own key too.
        if self.held {
            return Ok(true);
        }
        let mut conn = self.connection()?;
        self.held = self.set_nx(&mut conn)?;
        Ok(self.held)
    }

    #[instrument(skip(self, interrupt), fields(lock_key = %self.key), err)]
    fn try_acquire_for(
        &mut self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool, LockError> {
        if self.held {
            return Ok(true);
        }
        let deadline = Instant::now() + timeout;
        let mut conn = self.connection()?;

        loop {
            if self.set_nx(&mut conn)? {
                self.held = true;
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            if interrupt.wait_timeout((deadline - now).min(self.poll_interval)) {
                return Err(LockError::Interrupted);
            }
        }
    }

    #[instrument(skip(self), fields(lock_key = %self.key), err)]
    fn release(&mut self) -> Result<(), LockError> {
        if !self.held {
            return Ok(());
        }
        self.held = false;

        let mut conn = self.connection()?;
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&self.holder)
            .invoke(&mut conn)
            .map_err(|e| LockError::Backend(format!("release script failed: {e}")))?;

        if deleted == 0 {
            warn!(lock_key = %self.key, "lease expired before release");
        } else {
            debug!(lock_key = %self.key, "released lock");
        }
        Ok(())
    }

    fn is_held(&self) -> bool {
        self.held
    }
}
