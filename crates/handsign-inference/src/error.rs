//! Error types for inference operations.

use std::fmt;
use std::path::PathBuf;

use handsign_models::ErrorKind;
use thiserror::Error;

/// Result type for per-request inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors that can end a single prediction request.
///
/// Each variant maps onto one [`ErrorKind`] of the wire taxonomy. These are
/// expected outcomes and are converted into a structured prediction at the
/// pipeline boundary; they never abort the process.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Malformed landmark set: expected {expected} points, got {actual}")]
    MalformedLandmarkSet { expected: usize, actual: usize },

    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    #[error("Label index out of range: classifier produced {scores} scores for {labels} labels")]
    LabelIndexOutOfRange { scores: usize, labels: usize },
}

impl InferenceError {
    /// Create an invalid image error.
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage(message.into())
    }

    /// Create an inference failure error.
    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::InferenceFailure(message.into())
    }

    /// Wire taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InferenceError::InvalidImage(_) => ErrorKind::InvalidImage,
            InferenceError::MalformedLandmarkSet { .. } => ErrorKind::MalformedLandmarkSet,
            InferenceError::InferenceFailure(_) => ErrorKind::InferenceFailure,
            InferenceError::LabelIndexOutOfRange { .. } => ErrorKind::LabelIndexOutOfRange,
        }
    }
}

/// Errors raised while parsing a label table.
#[derive(Debug, Error)]
pub enum LabelTableError {
    #[error("label table is empty")]
    Empty,

    #[error("blank label on line {line}")]
    BlankLabel { line: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup component a [`StartupError`] is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartupComponent {
    HandDetector,
    Classifier,
    LabelTable,
}

impl StartupComponent {
    /// Components in load order.
    pub const ALL: &'static [StartupComponent] = &[
        StartupComponent::HandDetector,
        StartupComponent::Classifier,
        StartupComponent::LabelTable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StartupComponent::HandDetector => "hand_detector",
            StartupComponent::Classifier => "classifier",
            StartupComponent::LabelTable => "label_table",
        }
    }
}

impl fmt::Display for StartupComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that keep the service from becoming ready.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{component} model not found at {}", path.display())]
    ModelNotFound {
        component: StartupComponent,
        path: PathBuf,
    },

    #[error("{component} failed to load: {message}")]
    ModelLoad {
        component: StartupComponent,
        message: String,
    },

    #[error("Label table at {} is invalid: {source}", path.display())]
    LabelTable {
        path: PathBuf,
        #[source]
        source: LabelTableError,
    },

    #[error("Label table has {labels} labels but classifier produces {outputs} scores")]
    LabelMismatch { labels: usize, outputs: usize },
}

impl StartupError {
    /// Create a model load error.
    pub fn model_load(component: StartupComponent, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            component,
            message: message.into(),
        }
    }

    /// Component that failed.
    pub fn component(&self) -> StartupComponent {
        match self {
            StartupError::ModelNotFound { component, .. }
            | StartupError::ModelLoad { component, .. } => *component,
            StartupError::LabelTable { .. } | StartupError::LabelMismatch { .. } => {
                StartupComponent::LabelTable
            }
        }
    }
}
