//! Inference configuration.

use std::path::PathBuf;

use crate::classifier::ClassifierConfig;
use crate::decode::DEFAULT_MAX_IMAGE_DIMENSION;
use crate::detector::{
    HandDetectorConfig, DEFAULT_MIN_DETECTION_CONFIDENCE, DEFAULT_MIN_PRESENCE_CONFIDENCE,
};
use crate::palm::PalmDetectorConfig;

/// Model and label locations plus detector tuning.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Hand landmark detector settings
    pub detector: HandDetectorConfig,
    /// Gesture classifier settings
    pub classifier: ClassifierConfig,
    /// Newline-delimited label file
    pub labels_path: PathBuf,
    /// Largest accepted decoded width or height
    pub max_image_dimension: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            detector: HandDetectorConfig::default(),
            classifier: ClassifierConfig::default(),
            labels_path: PathBuf::from("models/labels.txt"),
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
        }
    }
}

impl InferenceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            detector: HandDetectorConfig {
                palm: PalmDetectorConfig {
                    model_path: std::env::var("PALM_DETECTION_MODEL_PATH")
                        .map(PathBuf::from)
                        .unwrap_or(defaults.detector.palm.model_path),
                    ..defaults.detector.palm
                },
                model_path: std::env::var("HAND_LANDMARK_MODEL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.detector.model_path),
                min_detection_confidence: unit_interval_from_env("MIN_DETECTION_CONFIDENCE")
                    .unwrap_or(DEFAULT_MIN_DETECTION_CONFIDENCE),
                min_presence_confidence: unit_interval_from_env("MIN_PRESENCE_CONFIDENCE")
                    .unwrap_or(DEFAULT_MIN_PRESENCE_CONFIDENCE),
                ..defaults.detector
            },
            classifier: ClassifierConfig {
                model_path: std::env::var("CLASSIFIER_MODEL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.classifier.model_path),
            },
            labels_path: std::env::var("LABELS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.labels_path),
            max_image_dimension: std::env::var("MAX_IMAGE_DIMENSION")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v: &u32| *v > 0)
                .unwrap_or(DEFAULT_MAX_IMAGE_DIMENSION),
        }
    }
}

/// A probability-like value from the environment; out-of-range values are ignored.
fn unit_interval_from_env(key: &str) -> Option<f32> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|v: &f32| (0.0..=1.0).contains(v))
}
