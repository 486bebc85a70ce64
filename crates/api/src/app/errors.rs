use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use joblock_core::JobError;

pub fn job_error_to_response(err: JobError) -> axum::response::Response {
    // Rejections are already logged by the pipeline.
    if !err.is_rejection() && !matches!(err, JobError::InvalidId(_)) {
        error!(error = %err, "job request failed");
    }

    let message = err.to_string();
    match err {
        JobError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        JobError::AlreadyProcessed(_) => {
            json_error(StatusCode::BAD_REQUEST, "already_processed", message)
        }
        JobError::Locked(_) => json_error(StatusCode::LOCKED, "locked", message),
        JobError::LockInterrupted(_) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "lock_interrupted", message)
        }
        JobError::LockBackend(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "lock_backend_error", message)
        }
        JobError::Store(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message),
        JobError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
    }
}

/// A blocking task that never reported back (panicked or was cancelled).
pub fn join_error_to_response(err: tokio::task::JoinError) -> axum::response::Response {
    error!(error = %err, "job task did not complete");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "job task did not complete",
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
