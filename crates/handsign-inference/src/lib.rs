//! Hand landmark to gesture label inference.
//!
//! This crate provides:
//! - Image decoding into an RGB pixel grid
//! - A hand landmark detector port with a two-stage ONNX Runtime adapter
//!   (palm detection, then landmarks on a rotated hand crop)
//! - Landmark flattening into the fixed 63-value classifier input
//! - A classifier port with an ONNX Runtime adapter
//! - Label resolution with deterministic tie-breaking
//! - The prediction pipeline that sequences all of the above and owns the
//!   per-request error policy
//! - Fail-closed startup loading of models and the label table

pub mod classifier;
pub mod config;
pub mod decode;
pub mod detector;
pub mod error;
pub mod labels;
pub mod landmarks;
pub mod metrics;
pub mod palm;
pub mod pipeline;
pub mod roi;
mod session;
pub mod startup;

pub use classifier::{ClassifierConfig, ClassifierEngine, OrtClassifier};
pub use config::InferenceConfig;
pub use decode::{decode_image, ImageDecoder, PixelGrid, DEFAULT_MAX_IMAGE_DIMENSION};
pub use detector::{
    HandDetectorConfig, HandLandmarkDetector, OrtHandLandmarker, DEFAULT_MIN_DETECTION_CONFIDENCE,
    DEFAULT_MIN_PRESENCE_CONFIDENCE,
};
pub use error::{
    InferenceError, InferenceResult, LabelTableError, StartupComponent, StartupError,
};
pub use labels::{LabelResolution, LabelTable};
pub use landmarks::{build_feature_vector, FeatureVector, LandmarkPoint, LandmarkSet, FEATURE_LEN};
pub use palm::{OrtPalmDetector, PalmDetection, PalmDetectorConfig};
pub use pipeline::{select_primary_hand, PipelineStage, PredictionPipeline};
pub use startup::load_pipeline;

pub use handsign_models::{ErrorKind, HandJoint, Prediction, HAND_LANDMARK_COUNT};
