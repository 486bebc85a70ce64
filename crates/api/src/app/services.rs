//! Backend selection for the job service.
//!
//! `DATABASE_URL` switches the job store to Postgres and `REDIS_URL` switches
//! the lock registry to Redis. Without them everything stays in-process, which
//! is what tests and single-instance development use.

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

use joblock_core::Interrupt;
use joblock_infra::config::JobLockConfig;
use joblock_infra::jobs::{
    InMemoryJobStore, JobLockCoordinator, JobService, JobStore, PostgresJobStore, SleepWorkload,
    Workload,
};
use joblock_infra::locks::{InMemoryLockRegistry, LockRegistry, RedisLockRegistry};

/// Wire a [`JobService`] from configuration, sharing `interrupt` with the
/// process shutdown path.
pub async fn build_services(config: &JobLockConfig, interrupt: Interrupt) -> anyhow::Result<JobService> {
    let store = build_store(config).await?;
    let registry = build_registry(config)?;
    let workload: Arc<dyn Workload> = Arc::new(SleepWorkload::new(config.workload_duration));

    Ok(build_with(config, store, registry, workload).with_interrupt(interrupt))
}

/// Assemble a service from explicit backends.
pub fn build_with(
    config: &JobLockConfig,
    store: Arc<dyn JobStore>,
    registry: Arc<dyn LockRegistry>,
    workload: Arc<dyn Workload>,
) -> JobService {
    let locks = JobLockCoordinator::new(registry, config.lock_policy);
    JobService::new(store, locks, workload)
}

/// In-process backends only; ignores `redis_url`/`database_url`.
pub fn build_in_memory_services(config: &JobLockConfig) -> JobService {
    let workload: Arc<dyn Workload> = Arc::new(SleepWorkload::new(config.workload_duration));
    build_with(
        config,
        InMemoryJobStore::arc(),
        InMemoryLockRegistry::arc(config.lock_registry_key.clone(), config.lock_lease),
        workload,
    )
}

async fn build_store(config: &JobLockConfig) -> anyhow::Result<Arc<dyn JobStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            let store = PostgresJobStore::new(pool);
            store
                .ensure_schema()
                .await
                .context("failed to create job table")?;
            info!("using Postgres job store");
            Ok(Arc::new(store))
        }
        None => {
            info!("DATABASE_URL not set; using in-memory job store");
            Ok(InMemoryJobStore::arc())
        }
    }
}

fn build_registry(config: &JobLockConfig) -> anyhow::Result<Arc<dyn LockRegistry>> {
    match &config.redis_url {
        Some(url) => {
            let registry =
                RedisLockRegistry::new(url, config.lock_registry_key.clone(), config.lock_lease)
                    .context("failed to create Redis lock registry")?;
            info!(registry_key = %config.lock_registry_key, "using Redis lock registry");
            Ok(Arc::new(registry))
        }
        None => {
            info!(
                registry_key = %config.lock_registry_key,
                "REDIS_URL not set; using in-memory lock registry"
            );
            Ok(InMemoryLockRegistry::arc(
                config.lock_registry_key.clone(),
                config.lock_lease,
            ))
        }
    }
}
