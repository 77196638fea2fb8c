//! Hand landmark detection.
//!
//! The pipeline only depends on the [`HandLandmarkDetector`] trait. The
//! bundled [`OrtHandLandmarker`] runs two MediaPipe models exported to ONNX:
//!
//! 1. the palm detector ([`crate::palm`]) finds palms on the whole image;
//! 2. each palm becomes a rotated square crop ([`HandRoi`]) and the hand
//!    landmark model runs on it:
//!    - input: `[1, 224, 224, 3]` RGB, f32 in `[0, 1]`
//!    - landmarks output: 21 × (x, y, z) in crop-pixel units
//!    - presence output: one hand-presence score in `[0, 1]`
//!
//! Landmarks are projected back so x/y land in `[0, 1]` relative to the
//! image and z shares the x scale.

use std::path::PathBuf;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::decode::PixelGrid;
use crate::error::{InferenceError, InferenceResult, StartupComponent, StartupError};
use crate::landmarks::{LandmarkPoint, LandmarkSet};
use crate::palm::{OrtPalmDetector, PalmDetection, PalmDetectorConfig};
use crate::roi::HandRoi;
use crate::session::create_session;

/// Minimum palm detection score for a hand to count.
///
/// Tunable through [`HandDetectorConfig::min_detection_confidence`].
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f32 = 0.5;

/// Minimum landmark-model presence score for a crop to yield a hand.
pub const DEFAULT_MIN_PRESENCE_CONFIDENCE: f32 = 0.5;

/// Detector capability consumed by the prediction pipeline.
///
/// Implementations return zero or more hands per call, each an ordered
/// landmark list. They must be safe to call from several threads at once;
/// engines that are not internally thread-safe serialize behind a lock.
pub trait HandLandmarkDetector: Send + Sync {
    fn detect(&self, grid: &PixelGrid) -> InferenceResult<Vec<LandmarkSet>>;
}

/// Configuration for the two-stage ONNX hand detector.
#[derive(Debug, Clone)]
pub struct HandDetectorConfig {
    /// Palm detection stage
    pub palm: PalmDetectorConfig,
    /// Path to the hand landmark ONNX model
    pub model_path: PathBuf,
    /// Palm score threshold
    pub min_detection_confidence: f32,
    /// Landmark-model hand presence threshold
    pub min_presence_confidence: f32,
    /// Landmark passes per image, strongest palms first. Zero disables
    /// detection. The pipeline classifies only the first hand returned.
    pub max_num_hands: usize,
    /// Landmark model input size (square)
    pub input_size: u32,
    /// Divisor applied to z after scaling by the input size
    pub normalize_z: f32,
    /// Output tensor holding the landmark coordinates
    pub landmarks_output: String,
    /// Output tensor holding the hand presence score
    pub presence_output: String,
}

impl Default for HandDetectorConfig {
    fn default() -> Self {
        Self {
            palm: PalmDetectorConfig::default(),
            model_path: PathBuf::from("models/hand_landmark.onnx"),
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            min_presence_confidence: DEFAULT_MIN_PRESENCE_CONFIDENCE,
            max_num_hands: 1,
            input_size: 224,
            normalize_z: 0.4,
            landmarks_output: "Identity".to_string(),
            presence_output: "Identity_1".to_string(),
        }
    }
}

/// Hand landmark detector backed by ONNX Runtime.
///
/// Static-image mode: every call is independent, nothing is tracked between
/// frames. The landmark session is behind a mutex because `Session::run`
/// needs exclusive access.
pub struct OrtHandLandmarker {
    palm: OrtPalmDetector,
    session: Mutex<Session>,
    config: HandDetectorConfig,
}

impl OrtHandLandmarker {
    /// Load the palm and landmark models.
    pub fn new(config: HandDetectorConfig) -> Result<Self, StartupError> {
        let palm = OrtPalmDetector::new(config.palm.clone())?;
        let session = create_session(&config.model_path, StartupComponent::HandDetector)?;
        info!(
            model_path = %config.model_path.display(),
            min_detection_confidence = config.min_detection_confidence,
            min_presence_confidence = config.min_presence_confidence,
            max_num_hands = config.max_num_hands,
            "Hand landmark detector initialized"
        );
        Ok(Self {
            palm,
            session: Mutex::new(session),
            config,
        })
    }

    pub fn config(&self) -> &HandDetectorConfig {
        &self.config
    }

    /// Sample the rotated crop and pack as NHWC f32 in `[0, 1]`.
    fn preprocess(&self, grid: &PixelGrid, roi: &HandRoi) -> InferenceResult<Value> {
        let size = self.config.input_size;
        let data = roi.crop(grid.as_rgb(), size);

        let shape = vec![1usize, size as usize, size as usize, 3];
        Tensor::from_array((shape, data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| InferenceError::inference_failed(format!("ORT tensor: {e}")))
    }

    /// Run the model and return (presence score, raw landmark values).
    fn run_inference(&self, input: Value) -> InferenceResult<(f32, Vec<f32>)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::inference_failed("hand detector session poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| InferenceError::inference_failed(format!("ORT run failed: {e}")))?;

        let presence = outputs
            .get(self.config.presence_output.as_str())
            .ok_or_else(|| {
                InferenceError::inference_failed(format!(
                    "missing {} tensor",
                    self.config.presence_output
                ))
            })?
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::inference_failed(format!("ORT extract: {e}")))?
            .1
            .first()
            .copied()
            .ok_or_else(|| InferenceError::inference_failed("empty presence tensor"))?;

        let landmarks = outputs
            .get(self.config.landmarks_output.as_str())
            .ok_or_else(|| {
                InferenceError::inference_failed(format!(
                    "missing {} tensor",
                    self.config.landmarks_output
                ))
            })?
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::inference_failed(format!("ORT extract: {e}")))?
            .1
            .to_vec();

        Ok((presence, landmarks))
    }
}

impl HandLandmarkDetector for OrtHandLandmarker {
    fn detect(&self, grid: &PixelGrid) -> InferenceResult<Vec<LandmarkSet>> {
        let palms = if self.config.max_num_hands == 0 {
            Vec::new()
        } else {
            self.palm.detect(grid, self.config.min_detection_confidence)?
        };

        let rois = hand_rois(&palms, self.config.max_num_hands);
        if rois.is_empty() {
            debug!(
                threshold = self.config.min_detection_confidence,
                "No palm above detection threshold"
            );
            return Ok(Vec::new());
        }

        let mut hands = Vec::with_capacity(rois.len());
        for roi in &rois {
            let input = self.preprocess(grid, roi)?;
            let (presence, raw) = self.run_inference(input)?;
            let image_size = (grid.width(), grid.height());
            if let Some(hand) = hand_from_outputs(presence, &raw, roi, image_size, &self.config)? {
                hands.push(hand);
            }
        }

        debug!(palms = palms.len(), hands = hands.len(), "Hand detection finished");
        Ok(hands)
    }
}

/// Crops for the strongest `max_num_hands` palms, in palm order.
pub(crate) fn hand_rois(palms: &[PalmDetection], max_num_hands: usize) -> Vec<HandRoi> {
    palms
        .iter()
        .take(max_num_hands)
        .map(HandRoi::from_palm)
        .collect()
}

/// Turn one landmark-model run into a hand in image coordinates.
///
/// `Ok(None)` when presence is below threshold or not a number.
pub(crate) fn hand_from_outputs(
    presence: f32,
    raw: &[f32],
    roi: &HandRoi,
    image_size: (u32, u32),
    config: &HandDetectorConfig,
) -> InferenceResult<Option<LandmarkSet>> {
    if presence.is_nan() || presence < config.min_presence_confidence {
        debug!(
            presence,
            threshold = config.min_presence_confidence,
            "Hand presence below threshold"
        );
        return Ok(None);
    }

    let local = landmarks_from_raw(raw, config.input_size as f32, config.normalize_z)?;
    let (width, height) = image_size;
    let points = local
        .points()
        .iter()
        .map(|p| roi.project(*p, width, height))
        .collect::<Vec<_>>();

    debug!(presence, points = points.len(), "Hand detected");
    Ok(Some(LandmarkSet::new(points)))
}

/// Convert a flat `[x, y, z, ...]` buffer in input-pixel units to
/// crop-normalized landmarks. z is further divided by `normalize_z`.
///
/// The point count is whatever the model produced; the pipeline enforces 21.
pub(crate) fn landmarks_from_raw(
    raw: &[f32],
    input_size: f32,
    normalize_z: f32,
) -> InferenceResult<LandmarkSet> {
    if raw.len() % 3 != 0 {
        return Err(InferenceError::inference_failed(format!(
            "landmark tensor has {} values, not a multiple of 3",
            raw.len()
        )));
    }
    if input_size <= 0.0 || normalize_z <= 0.0 {
        return Err(InferenceError::inference_failed(
            "detector input size and z scale must be positive",
        ));
    }

    let points = raw
        .chunks_exact(3)
        .map(|c| {
            LandmarkPoint::new(
                c[0] / input_size,
                c[1] / input_size,
                c[2] / input_size / normalize_z,
            )
        })
        .collect();
    Ok(LandmarkSet::new(points))
}
