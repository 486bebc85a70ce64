//! Configuration loading and representation.
//!
//! Read once at startup from environment variables; there is no reload.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `JOBLOCK_LOCK_REGISTRY_KEY` | `joblock` | namespace prefixed to every lock key |
//! | `JOBLOCK_LOCK_LEASE_SECS` | `60` | expiry of a lock that is never released; must exceed workload + wait |
//! | `JOBLOCK_LOCK_POLICY` | `non_blocking` | `non_blocking` or `blocking` |
//! | `JOBLOCK_LOCK_WAIT_MS` | `1000` | bounded wait used by the `blocking` policy |
//! | `JOBLOCK_WORKLOAD_SECS` | `10` | duration of the placeholder workload |
//! | `JOBLOCK_BIND_ADDR` | `0.0.0.0:8080` | HTTP listen address |
//! | `REDIS_URL` | unset | Redis lock backend (in-memory locks when unset) |
//! | `DATABASE_URL` | unset | Postgres job store (in-memory store when unset) |

use std::time::Duration;

use crate::jobs::LockPolicy;

const DEFAULT_REGISTRY_KEY: &str = "joblock";
const DEFAULT_LEASE_SECS: u64 = 60;
const DEFAULT_WAIT_MS: u64 = 1000;
const DEFAULT_WORKLOAD_SECS: u64 = 10;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLockConfig {
    pub lock_registry_key: String,
    pub lock_lease: Duration,
    pub lock_policy: LockPolicy,
    pub workload_duration: Duration,
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub database_url: Option<String>,
}

impl Default for JobLockConfig {
    fn default() -> Self {
        Self {
            lock_registry_key: DEFAULT_REGISTRY_KEY.to_string(),
            lock_lease: Duration::from_secs(DEFAULT_LEASE_SECS),
            lock_policy: LockPolicy::NonBlocking,
            workload_duration: Duration::from_secs(DEFAULT_WORKLOAD_SECS),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            redis_url: None,
            database_url: None,
        }
    }
}

impl JobLockConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let lock_policy = match get("JOBLOCK_LOCK_POLICY").as_deref().map(str::trim) {
            None | Some("non_blocking") => LockPolicy::NonBlocking,
            Some("blocking") => LockPolicy::Blocking {
                timeout: Duration::from_millis(parse_u64(
                    "JOBLOCK_LOCK_WAIT_MS",
                    get("JOBLOCK_LOCK_WAIT_MS"),
                    DEFAULT_WAIT_MS,
                )?),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "JOBLOCK_LOCK_POLICY",
                    value: other.to_string(),
                    reason: "expected non_blocking or blocking".to_string(),
                });
            }
        };

        let lease_secs = parse_u64("JOBLOCK_LOCK_LEASE_SECS", get("JOBLOCK_LOCK_LEASE_SECS"), DEFAULT_LEASE_SECS)?;
        if lease_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "JOBLOCK_LOCK_LEASE_SECS",
                value: "0".to_string(),
                reason: "lease must be at least one second".to_string(),
            });
        }

        let config = Self {
            lock_registry_key: get("JOBLOCK_LOCK_REGISTRY_KEY")
                .unwrap_or_else(|| DEFAULT_REGISTRY_KEY.to_string()),
            lock_lease: Duration::from_secs(lease_secs),
            lock_policy,
            workload_duration: Duration::from_secs(parse_u64(
                "JOBLOCK_WORKLOAD_SECS",
                get("JOBLOCK_WORKLOAD_SECS"),
                DEFAULT_WORKLOAD_SECS,
            )?),
            bind_addr: get("JOBLOCK_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            redis_url: get("REDIS_URL"),
            database_url: get("DATABASE_URL"),
        };
        config.check_lease()?;
        Ok(config)
    }

    /// Leases are never renewed, so the lease must outlive the workload plus
    /// the bounded lock wait. Otherwise a second start could take the expired
    /// lock and run the job again.
    fn check_lease(&self) -> Result<(), ConfigError> {
        let wait = match self.lock_policy {
            LockPolicy::NonBlocking => Duration::ZERO,
            LockPolicy::Blocking { timeout } => timeout,
        };
        let needed = self.workload_duration + wait;
        if self.lock_lease <= needed {
            return Err(ConfigError::Invalid {
                var: "JOBLOCK_LOCK_LEASE_SECS",
                value: self.lock_lease.as_secs().to_string(),
                reason: format!(
                    "lease must exceed the workload duration plus lock wait ({}ms)",
                    needed.as_millis()
                ),
            });
        }
        Ok(())
    }
}

fn parse_u64(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                var,
                value,
                reason: e.to_string(),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<JobLockConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        JobLockConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(load(&[]).unwrap(), JobLockConfig::default());
    }

    #[test]
    fn blocking_policy_reads_wait() {
        let cfg = load(&[
            ("JOBLOCK_LOCK_POLICY", "blocking"),
            ("JOBLOCK_LOCK_WAIT_MS", "250"),
            ("JOBLOCK_LOCK_REGISTRY_KEY", "billing-locks"),
            ("JOBLOCK_LOCK_LEASE_SECS", "30"),
        ])
        .unwrap();

        assert_eq!(
            cfg.lock_policy,
            LockPolicy::Blocking {
                timeout: Duration::from_millis(250)
            }
        );
        assert_eq!(cfg.lock_registry_key, "billing-locks");
        assert_eq!(cfg.lock_lease, Duration::from_secs(30));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = load(&[("JOBLOCK_LOCK_POLICY", "eventually")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "JOBLOCK_LOCK_POLICY", .. }));
    }

    #[test]
    fn rejects_malformed_numbers_and_zero_lease() {
        assert!(load(&[("JOBLOCK_WORKLOAD_SECS", "ten")]).is_err());
        assert!(load(&[("JOBLOCK_LOCK_LEASE_SECS", "0")]).is_err());
    }

    #[test]
    fn rejects_lease_shorter_than_workload() {
        let err = load(&[
            ("JOBLOCK_LOCK_LEASE_SECS", "1"),
            ("JOBLOCK_WORKLOAD_SECS", "120"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "JOBLOCK_LOCK_LEASE_SECS", .. }));

        // Equal is not enough: the save and release happen after the workload.
        assert!(load(&[("JOBLOCK_LOCK_LEASE_SECS", "10"), ("JOBLOCK_WORKLOAD_SECS", "10")]).is_err());
        assert!(load(&[("JOBLOCK_LOCK_LEASE_SECS", "11"), ("JOBLOCK_WORKLOAD_SECS", "10")]).is_ok());
    }

    #[test]
    fn blocking_wait_counts_against_the_lease() {
        let vars = [
            ("JOBLOCK_LOCK_POLICY", "blocking"),
            ("JOBLOCK_LOCK_WAIT_MS", "5000"),
            ("JOBLOCK_LOCK_LEASE_SECS", "12"),
            ("JOBLOCK_WORKLOAD_SECS", "10"),
        ];
        assert!(load(&vars).is_err());
        assert!(load(&[("JOBLOCK_LOCK_LEASE_SECS", "12"), ("JOBLOCK_WORKLOAD_SECS", "10")]).is_ok());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = load(&[("REDIS_URL", "  "), ("JOBLOCK_BIND_ADDR", "")]).unwrap();
        assert!(cfg.redis_url.is_none());
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
    }
}
