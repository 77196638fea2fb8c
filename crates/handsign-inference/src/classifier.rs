//! Gesture classifier over flattened hand landmarks.
//!
//! The classifier takes one `1 × 63` f32 row and returns one score per
//! label. [`OrtClassifier`] runs the trained model through ONNX Runtime and
//! probes its output width once at load time so the label table can be
//! checked against it before any request is served.

use std::path::PathBuf;
use std::sync::Mutex;

use ndarray::Array2;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::info;

use crate::error::{InferenceError, InferenceResult, StartupComponent, StartupError};
use crate::landmarks::FEATURE_LEN;
use crate::session::create_session;

/// Classifier capability consumed by the prediction pipeline.
pub trait ClassifierEngine: Send + Sync {
    /// Score a `1 × 63` feature row. Returns one score per label.
    fn classify(&self, input: &Array2<f32>) -> InferenceResult<Vec<f32>>;

    /// Number of scores every call returns.
    fn output_len(&self) -> usize;
}

/// Configuration for the ONNX classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Path to ONNX model file
    pub model_path: PathBuf,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/asl_landmark_model.onnx"),
        }
    }
}

/// Landmark classifier backed by ONNX Runtime.
pub struct OrtClassifier {
    session: Mutex<Session>,
    output_name: String,
    output_len: usize,
}

impl OrtClassifier {
    /// Load the model and probe its output width with an all-zero input.
    pub fn load(config: &ClassifierConfig) -> Result<Self, StartupError> {
        let session = create_session(&config.model_path, StartupComponent::Classifier)?;

        if session.inputs.len() != 1 {
            return Err(StartupError::model_load(
                StartupComponent::Classifier,
                format!("expected exactly one input, model has {}", session.inputs.len()),
            ));
        }

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| {
                StartupError::model_load(StartupComponent::Classifier, "model has no outputs")
            })?;

        let mut classifier = Self {
            session: Mutex::new(session),
            output_name,
            output_len: 0,
        };

        let probe = classifier
            .run(&Array2::zeros((1, FEATURE_LEN)))
            .map_err(|e| {
                StartupError::model_load(StartupComponent::Classifier, format!("probe run: {e}"))
            })?;
        if probe.is_empty() {
            return Err(StartupError::model_load(
                StartupComponent::Classifier,
                "model produced an empty output",
            ));
        }
        classifier.output_len = probe.len();

        info!(
            model_path = %config.model_path.display(),
            output = %classifier.output_name,
            classes = classifier.output_len,
            "Gesture classifier initialized"
        );

        Ok(classifier)
    }

    fn run(&self, input: &Array2<f32>) -> InferenceResult<Vec<f32>> {
        if input.shape() != [1, FEATURE_LEN] {
            return Err(InferenceError::inference_failed(format!(
                "expected 1x{FEATURE_LEN} input, got {:?}",
                input.shape()
            )));
        }

        let data: Vec<f32> = input.iter().copied().collect();
        let tensor: Value = Tensor::from_array((vec![1usize, FEATURE_LEN], data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| InferenceError::inference_failed(format!("ORT tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::inference_failed("classifier session poisoned"))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::inference_failed(format!("ORT run failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::inference_failed(format!("missing {} tensor", self.output_name))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::inference_failed(format!("ORT extract: {e}")))?;

        // Accept [1, N] or [N]
        match shape.len() {
            2 if shape[0] == 1 => {}
            1 => {}
            _ => {
                return Err(InferenceError::inference_failed(format!(
                    "unexpected classifier output shape: {:?}",
                    shape
                )))
            }
        }

        Ok(data.to_vec())
    }
}

impl ClassifierEngine for OrtClassifier {
    fn classify(&self, input: &Array2<f32>) -> InferenceResult<Vec<f32>> {
        let scores = self.run(input)?;
        if scores.len() != self.output_len {
            return Err(InferenceError::inference_failed(format!(
                "classifier returned {} scores, expected {}",
                scores.len(),
                self.output_len
            )));
        }
        Ok(scores)
    }

    fn output_len(&self) -> usize {
        self.output_len
    }
}
