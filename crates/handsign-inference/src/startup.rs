//! Fail-closed startup.
//!
//! Loads the detector (palm and landmark models), the classifier, and the
//! label table in that order and stops at the first failure. The caller
//! decides what a failure means for the process; the pipeline itself is only
//! handed out when every component loaded and the label table matches the
//! classifier.

use std::sync::Arc;

use tracing::info;

use crate::classifier::OrtClassifier;
use crate::config::InferenceConfig;
use crate::decode::ImageDecoder;
use crate::detector::OrtHandLandmarker;
use crate::error::StartupError;
use crate::labels::LabelTable;
use crate::pipeline::PredictionPipeline;

/// Load every component named by `config` and assemble the pipeline.
pub fn load_pipeline(config: &InferenceConfig) -> Result<PredictionPipeline, StartupError> {
    let detector = OrtHandLandmarker::new(config.detector.clone())?;
    let classifier = OrtClassifier::load(&config.classifier)?;

    let labels =
        LabelTable::load(&config.labels_path).map_err(|source| StartupError::LabelTable {
            path: config.labels_path.clone(),
            source,
        })?;

    let pipeline = PredictionPipeline::new(Arc::new(detector), Arc::new(classifier), Arc::new(labels))?
        .with_decoder(ImageDecoder::new(config.max_image_dimension));

    info!(
        classes = pipeline.labels().len(),
        max_image_dimension = config.max_image_dimension,
        "Prediction pipeline ready"
    );

    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StartupComponent;
    use std::path::PathBuf;

    #[test]
    fn test_missing_detector_fails_first() {
        let mut config = InferenceConfig::default();
        config.detector.palm.model_path = PathBuf::from("/nonexistent/palm_detection.onnx");
        config.detector.model_path = PathBuf::from("/nonexistent/hand_landmark.onnx");
        config.classifier.model_path = PathBuf::from("/nonexistent/classifier.onnx");

        let err = load_pipeline(&config).unwrap_err();
        assert_eq!(err.component(), StartupComponent::HandDetector);
    }
}
