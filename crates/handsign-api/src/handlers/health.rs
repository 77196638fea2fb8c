//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use handsign_inference::StartupComponent;
use serde::Serialize;

use crate::state::{AppState, Readiness};

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<usize>,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub hand_detector: CheckStatus,
    pub classifier: CheckStatus,
    pub label_table: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }

    /// Not attempted because an earlier component failed.
    fn skipped() -> Self {
        Self {
            status: "skipped".to_string(),
            error: None,
        }
    }
}

/// Readiness check endpoint (readiness probe).
///
/// Components load in order; everything before the failing one is `ok` and
/// everything after it is `skipped`.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    match state.readiness() {
        Readiness::Ready(pipeline) => Ok(Json(ReadinessResponse {
            status: "ready".to_string(),
            checks: ReadinessChecks {
                hand_detector: CheckStatus::ok(),
                classifier: CheckStatus::ok(),
                label_table: CheckStatus::ok(),
            },
            classes: Some(pipeline.labels().len()),
        })),
        Readiness::Failed(failure) => {
            let failed_at = StartupComponent::ALL
                .iter()
                .position(|c| *c == failure.component)
                .unwrap_or(0);

            let check = |component: StartupComponent| {
                let pos = StartupComponent::ALL
                    .iter()
                    .position(|c| *c == component)
                    .unwrap_or(0);
                if pos < failed_at {
                    CheckStatus::ok()
                } else if pos == failed_at {
                    CheckStatus::error(failure.message.clone())
                } else {
                    CheckStatus::skipped()
                }
            };

            let response = ReadinessResponse {
                status: "not_ready".to_string(),
                checks: ReadinessChecks {
                    hand_detector: check(StartupComponent::HandDetector),
                    classifier: check(StartupComponent::Classifier),
                    label_table: check(StartupComponent::LabelTable),
                },
                classes: None,
            };

            Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
        }
    }
}
