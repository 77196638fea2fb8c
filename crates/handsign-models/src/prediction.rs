//! Prediction outcomes and their wire representation.
//!
//! A request ends in exactly one of three states: a classified gesture, no
//! hand in the image, or a per-request error. The wire shape keeps the
//! `prediction` field for all three so clients branch on one key.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `prediction` value reported when the detector finds no hand.
pub const NO_HAND_PREDICTION: &str = "No hand detected";

/// `prediction` value reported for every per-request error.
pub const ERROR_PREDICTION: &str = "Error";

/// Confidence reported with [`Prediction::NoHandDetected`].
///
/// Fixed sentinel, not a model output.
pub const NO_HAND_CONFIDENCE: f32 = 0.0;

/// Per-request error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bytes did not decode to a pixel grid.
    InvalidImage,
    /// Landmark count was not 21.
    MalformedLandmarkSet,
    /// Detector or classifier invocation failed.
    InferenceFailure,
    /// Score count did not match the label table.
    LabelIndexOutOfRange,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidImage => "invalid_image",
            ErrorKind::MalformedLandmarkSet => "malformed_landmark_set",
            ErrorKind::InferenceFailure => "inference_failure",
            ErrorKind::LabelIndexOutOfRange => "label_index_out_of_range",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal outcome of one prediction request.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// A hand was found and classified.
    Success { label: String, confidence: f32 },
    /// The detector found no hand. Not an error.
    NoHandDetected,
    /// The request failed at some pipeline stage.
    Error { kind: ErrorKind, detail: String },
}

impl Prediction {
    pub fn success(label: impl Into<String>, confidence: f32) -> Self {
        Self::Success {
            label: label.into(),
            confidence,
        }
    }

    pub fn error(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::Error {
            kind,
            detail: detail.into(),
        }
    }

    /// Confidence carried by this outcome, if any.
    pub fn confidence(&self) -> Option<f32> {
        match self {
            Prediction::Success { confidence, .. } => Some(*confidence),
            Prediction::NoHandDetected => Some(NO_HAND_CONFIDENCE),
            Prediction::Error { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Prediction::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Prediction::Error { .. })
    }

    /// Error kind, for error outcomes.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Prediction::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Short outcome name used in logs and metric labels.
    pub fn outcome(&self) -> &'static str {
        match self {
            Prediction::Success { .. } => "success",
            Prediction::NoHandDetected => "no_hand_detected",
            Prediction::Error { kind, .. } => kind.as_str(),
        }
    }
}

/// JSON body returned for a prediction request.
///
/// ```json
/// {"prediction": "A", "confidence": 0.97}
/// {"prediction": "No hand detected", "confidence": 0.0}
/// {"prediction": "Error", "detail": "Invalid image: ...", "kind": "invalid_image"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PredictionResponse {
    pub prediction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl From<&Prediction> for PredictionResponse {
    fn from(prediction: &Prediction) -> Self {
        match prediction {
            Prediction::Success { label, confidence } => Self {
                prediction: label.clone(),
                confidence: Some(*confidence),
                detail: None,
                kind: None,
            },
            Prediction::NoHandDetected => Self {
                prediction: NO_HAND_PREDICTION.to_string(),
                confidence: Some(NO_HAND_CONFIDENCE),
                detail: None,
                kind: None,
            },
            Prediction::Error { kind, detail } => Self {
                prediction: ERROR_PREDICTION.to_string(),
                confidence: None,
                detail: Some(detail.clone()),
                kind: Some(*kind),
            },
        }
    }
}

impl From<Prediction> for PredictionResponse {
    fn from(prediction: Prediction) -> Self {
        Self::from(&prediction)
    }
}
