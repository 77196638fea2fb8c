//! Gesture prediction handler.

use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use handsign_models::PredictionResponse;
use tracing::{error, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Classify the hand gesture in an uploaded image.
///
/// Domain outcomes (a label, no hand, or a per-request error) are all 200
/// responses with a [`PredictionResponse`] body. Non-2xx is reserved for
/// transport problems and for a service that never became ready.
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<PredictionResponse>> {
    let pipeline = match state.pipeline() {
        Some(pipeline) => pipeline.clone(),
        None => {
            let detail = state
                .startup_failure()
                .map(|f| format!("{} failed to load", f.component))
                .unwrap_or_else(|| "models not loaded".to_string());
            return Err(ApiError::not_ready(detail));
        }
    };

    let bytes = read_file_field(&mut multipart).await?;

    let timeout = state.config.request_timeout;
    let task = tokio::task::spawn_blocking(move || pipeline.predict(&bytes));

    let prediction = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(prediction)) => prediction,
        Ok(Err(e)) => {
            error!(error = %e, "Prediction worker failed");
            return Err(ApiError::internal(format!("prediction worker failed: {e}")));
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs_f64(), "Prediction timed out");
            return Err(ApiError::Timeout(timeout));
        }
    };

    Ok(Json(PredictionResponse::from(prediction)))
}

/// Pull the bytes of the `file` field, skipping any other fields.
async fn read_file_field(multipart: &mut Multipart) -> ApiResult<Bytes> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(FILE_FIELD) {
            return field.bytes().await.map_err(multipart_error);
        }
    }

    Err(ApiError::bad_request(format!(
        "missing multipart field '{FILE_FIELD}'"
    )))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(format!("invalid multipart body: {}", err.body_text()))
    }
}
