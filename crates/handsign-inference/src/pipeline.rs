//! Prediction pipeline.
//!
//! Sequences one request through five stages and turns every per-request
//! failure into a structured [`Prediction`]:
//!
//! 1. `Decoding`: bytes → RGB pixel grid, else `InvalidImage`
//! 2. `Detecting`: zero hands → `NoHandDetected`; otherwise the first hand
//! 3. `Vectorizing`: 21 landmarks → 63 features, else `MalformedLandmarkSet`
//! 4. `Inferring`: 1 × 63 tensor → scores, else `InferenceFailure`
//! 5. `Resolving`: scores → label, else `LabelIndexOutOfRange`
//!
//! Nothing is retried. Every stage is deterministic for its input.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use handsign_models::{HandJoint, Prediction};
use tracing::{debug, info, info_span, warn};

use crate::classifier::ClassifierEngine;
use crate::decode::ImageDecoder;
use crate::detector::HandLandmarkDetector;
use crate::error::{InferenceError, StartupError};
use crate::labels::{LabelResolution, LabelTable};
use crate::landmarks::{build_feature_vector, LandmarkSet};
use crate::metrics;

/// Pipeline stage, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Decoding,
    Detecting,
    Vectorizing,
    Inferring,
    Resolving,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Decoding => "decoding",
            PipelineStage::Detecting => "detecting",
            PipelineStage::Vectorizing => "vectorizing",
            PipelineStage::Inferring => "inferring",
            PipelineStage::Resolving => "resolving",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error tagged with the stage that produced it.
#[derive(Debug)]
struct StageError {
    stage: PipelineStage,
    error: InferenceError,
}

trait AtStage<T> {
    fn at(self, stage: PipelineStage) -> Result<T, StageError>;
}

impl<T> AtStage<T> for Result<T, InferenceError> {
    fn at(self, stage: PipelineStage) -> Result<T, StageError> {
        self.map_err(|error| StageError { stage, error })
    }
}

/// Keep the first hand the detector reported and drop the rest.
///
/// The service classifies one hand per image. Detectors configured for a
/// single hand already return at most one; for any that return more, the
/// detector's own ordering decides which hand is classified.
pub fn select_primary_hand(hands: Vec<LandmarkSet>) -> Option<LandmarkSet> {
    let total = hands.len();
    let primary = hands.into_iter().next();
    if total > 1 {
        debug!(discarded = total - 1, "Ignoring additional detected hands");
    }
    primary
}

/// One image in, one [`Prediction`] out.
///
/// Holds read-only, shared handles to the detector, classifier, and label
/// table. Cheap to clone; clones share the engines.
#[derive(Clone)]
pub struct PredictionPipeline {
    decoder: ImageDecoder,
    detector: Arc<dyn HandLandmarkDetector>,
    classifier: Arc<dyn ClassifierEngine>,
    labels: Arc<LabelTable>,
}

impl fmt::Debug for PredictionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionPipeline")
            .field("decoder", &self.decoder)
            .field("classes", &self.labels.len())
            .finish_non_exhaustive()
    }
}

impl PredictionPipeline {
    /// Assemble a pipeline.
    ///
    /// Fails when the label table and classifier disagree on the number of
    /// classes, so a mismatch is caught before any request.
    pub fn new(
        detector: Arc<dyn HandLandmarkDetector>,
        classifier: Arc<dyn ClassifierEngine>,
        labels: Arc<LabelTable>,
    ) -> Result<Self, StartupError> {
        let outputs = classifier.output_len();
        if outputs != labels.len() {
            return Err(StartupError::LabelMismatch {
                labels: labels.len(),
                outputs,
            });
        }

        Ok(Self {
            decoder: ImageDecoder::default(),
            detector,
            classifier,
            labels,
        })
    }

    /// Replace the image decoder (e.g. to change size limits).
    pub fn with_decoder(mut self, decoder: ImageDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Classify the gesture in one encoded image.
    ///
    /// Never fails: decode errors, missing hands, and engine failures all
    /// come back as a [`Prediction`] variant.
    pub fn predict(&self, bytes: &[u8]) -> Prediction {
        let span = info_span!("predict", bytes = bytes.len());
        let _guard = span.enter();
        let start = Instant::now();

        let prediction = match self.run(bytes) {
            Ok(Some(resolution)) => {
                info!(
                    label = %resolution.label,
                    index = resolution.index,
                    confidence = resolution.confidence,
                    "Gesture classified"
                );
                Prediction::success(resolution.label, resolution.confidence)
            }
            Ok(None) => {
                info!("No hand detected");
                Prediction::NoHandDetected
            }
            Err(StageError { stage, error }) => {
                warn!(stage = %stage, kind = %error.kind(), error = %error, "Prediction failed");
                metrics::record_stage_failure(stage.as_str());
                Prediction::error(error.kind(), error.to_string())
            }
        };

        metrics::record_prediction(prediction.outcome(), start.elapsed().as_secs_f64());
        prediction
    }

    /// Run all stages. `Ok(None)` means no hand was found.
    fn run(&self, bytes: &[u8]) -> Result<Option<LabelResolution>, StageError> {
        let grid = self.decoder.decode(bytes).at(PipelineStage::Decoding)?;

        let hands = self.detector.detect(&grid).at(PipelineStage::Detecting)?;
        drop(grid);

        let Some(hand) = select_primary_hand(hands) else {
            return Ok(None);
        };
        if let Some(anchor) = hand.joint(HandJoint::Wrist) {
            debug!(
                joint = HandJoint::Wrist.as_str(),
                x = anchor.x,
                y = anchor.y,
                points = hand.len(),
                "Primary hand selected"
            );
        }

        let features = build_feature_vector(&hand).at(PipelineStage::Vectorizing)?;

        let scores = self
            .classifier
            .classify(&features.to_input_tensor())
            .at(PipelineStage::Inferring)?;
        if let Some(pos) = scores.iter().position(|s| !s.is_finite()) {
            return Err(InferenceError::inference_failed(format!(
                "classifier returned non-finite score at index {pos}"
            )))
            .at(PipelineStage::Inferring);
        }

        self.labels
            .resolve(&scores)
            .map(Some)
            .at(PipelineStage::Resolving)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LandmarkPoint;

    fn hand(tag: f32) -> LandmarkSet {
        LandmarkSet::new(vec![LandmarkPoint::new(tag, tag, tag); 21])
    }

    #[test]
    fn test_select_primary_hand_empty() {
        assert_eq!(select_primary_hand(Vec::new()), None);
    }

    #[test]
    fn test_select_primary_hand_takes_first() {
        let selected = select_primary_hand(vec![hand(1.0), hand(2.0), hand(3.0)]).unwrap();
        assert_eq!(selected, hand(1.0));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::Decoding.to_string(), "decoding");
        assert_eq!(PipelineStage::Resolving.as_str(), "resolving");
    }
}
