use std::sync::Arc;

use anyhow::Context;

use joblock_core::Interrupt;
use joblock_infra::config::JobLockConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    joblock_observability::init();

    let config = JobLockConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        registry_key = %config.lock_registry_key,
        lock_policy = ?config.lock_policy,
        "loaded configuration"
    );

    let interrupt = Interrupt::new();
    let services = joblock_api::app::services::build_services(&config, interrupt.clone()).await?;
    let app = joblock_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(interrupt))
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C and interrupts running workloads and lock waits so
/// in-flight starts finish with a recorded status.
async fn shutdown_signal(interrupt: Interrupt) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
    interrupt.trigger();
}
