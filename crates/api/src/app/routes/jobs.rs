use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use joblock_core::{JobId, JobResult};
use joblock_infra::jobs::JobService;

use crate::app::errors;

pub fn router() -> Router {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/:id/start", post(start_job))
}

#[derive(Debug, Deserialize)]
pub struct CreateJobQuery {
    pub name: String,
}

pub async fn list_jobs(Extension(services): Extension<Arc<JobService>>) -> axum::response::Response {
    match run_blocking(services, |s| s.list_jobs()).await {
        Ok(Ok(jobs)) => Json(jobs).into_response(),
        Ok(Err(e)) => errors::job_error_to_response(e),
        Err(e) => errors::join_error_to_response(e),
    }
}

pub async fn create_job(
    Extension(services): Extension<Arc<JobService>>,
    Query(query): Query<CreateJobQuery>,
) -> axum::response::Response {
    match run_blocking(services, move |s| s.create_job(&query.name)).await {
        Ok(Ok(id)) => Json(id.value()).into_response(),
        Ok(Err(e)) => errors::job_error_to_response(e),
        Err(e) => errors::join_error_to_response(e),
    }
}

/// Runs the job to completion before answering; a success carries no body.
pub async fn start_job(
    Extension(services): Extension<Arc<JobService>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match id.parse() {
        Ok(id) => id,
        Err(e) => return errors::job_error_to_response(e),
    };

    match run_blocking(services, move |s| s.start_job(id)).await {
        Ok(Ok(())) => StatusCode::OK.into_response(),
        Ok(Err(e)) => errors::job_error_to_response(e),
        Err(e) => errors::join_error_to_response(e),
    }
}

/// The pipeline is thread-bound (store calls and lock waits block), so it
/// never runs on an async worker.
async fn run_blocking<T, F>(
    services: Arc<JobService>,
    f: F,
) -> Result<JobResult<T>, tokio::task::JoinError>
where
    T: Send + 'static,
    F: FnOnce(&JobService) -> JobResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&services)).await
}
