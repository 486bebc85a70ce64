//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: backend selection (job store, lock registry, workload)
//! - `routes/`: HTTP routes + handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use joblock_infra::jobs::JobService;

pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router around an already wired [`JobService`].
pub fn build_app(services: Arc<JobService>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
