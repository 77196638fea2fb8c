//! Palm detection.
//!
//! First stage of the hand detector. Runs a MediaPipe-style SSD palm model
//! exported to ONNX on a letterboxed square copy of the image:
//!
//! - input: `[1, 192, 192, 3]` RGB, f32 in `[0, 1]`
//! - regressors: `[1, 2016, 18]` box offsets plus 7 palm keypoints per anchor
//! - scores: `[1, 2016, 1]` raw logits per anchor
//!
//! Anchors are decoded, thresholded, and merged with weighted non-maximum
//! suppression. Detections are returned in image pixels, best first.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::decode::PixelGrid;
use crate::error::{InferenceError, InferenceResult, StartupComponent, StartupError};
use crate::session::create_session;

/// Values per anchor in the regressor output: box (4) + 7 keypoints (14).
const REGRESSOR_STRIDE: usize = 18;

/// Palm keypoints reported per detection.
pub const PALM_KEYPOINTS: usize = 7;

/// Keypoint at the wrist center.
pub const WRIST_KEYPOINT: usize = 0;

/// Keypoint at the middle finger MCP joint.
pub const MIDDLE_MCP_KEYPOINT: usize = 2;

/// Logits are clipped to this magnitude before the sigmoid.
const SCORE_CLIPPING_THRESH: f32 = 100.0;

/// Configuration for the ONNX palm detector.
#[derive(Debug, Clone)]
pub struct PalmDetectorConfig {
    /// Path to ONNX model file
    pub model_path: PathBuf,
    /// Square input size
    pub input_size: u32,
    /// Feature map stride per SSD layer
    pub strides: Vec<u32>,
    /// IoU above which detections are merged
    pub min_suppression_threshold: f32,
    /// Output tensor holding box and keypoint regressions
    pub regressors_output: String,
    /// Output tensor holding per-anchor score logits
    pub scores_output: String,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/palm_detection.onnx"),
            input_size: 192,
            strides: vec![8, 16, 16, 16],
            min_suppression_threshold: 0.3,
            regressors_output: "Identity".to_string(),
            scores_output: "Identity_1".to_string(),
        }
    }
}

/// SSD anchor center in normalized input coordinates. Anchors have unit size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

/// Generate the anchor grid for a square input.
///
/// Consecutive layers sharing a stride are emitted together, two anchors per
/// layer per feature map cell.
pub fn generate_anchors(input_size: u32, strides: &[u32]) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    let mut layer = 0;

    while layer < strides.len() {
        let stride = strides[layer];
        let mut last = layer;
        while last < strides.len() && strides[last] == stride {
            last += 1;
        }

        if stride > 0 {
            let per_cell = 2 * (last - layer);
            let cells = input_size.div_ceil(stride);
            for y in 0..cells {
                for x in 0..cells {
                    let anchor = Anchor {
                        x: (x as f32 + 0.5) / cells as f32,
                        y: (y as f32 + 0.5) / cells as f32,
                    };
                    anchors.extend(std::iter::repeat(anchor).take(per_cell));
                }
            }
        }

        layer = last;
    }

    anchors
}

/// One palm: center-format box and keypoints.
///
/// Units depend on where the value came from: normalized letterbox
/// coordinates straight out of [`decode_palms`], image pixels after
/// [`Letterbox::palm_to_image`].
#[derive(Debug, Clone, PartialEq)]
pub struct PalmDetection {
    pub score: f32,
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
    pub keypoints: [(f32, f32); PALM_KEYPOINTS],
}

impl PalmDetection {
    fn iou(&self, other: &PalmDetection) -> f32 {
        let x1 = (self.x_center - self.width / 2.0).max(other.x_center - other.width / 2.0);
        let y1 = (self.y_center - self.height / 2.0).max(other.y_center - other.height / 2.0);
        let x2 = (self.x_center + self.width / 2.0).min(other.x_center + other.width / 2.0);
        let y2 = (self.y_center + self.height / 2.0).min(other.y_center + other.height / 2.0);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.width * self.height + other.width * other.height - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

fn sigmoid(logit: f32) -> f32 {
    let clipped = logit.clamp(-SCORE_CLIPPING_THRESH, SCORE_CLIPPING_THRESH);
    1.0 / (1.0 + (-clipped).exp())
}

/// Decode raw model outputs into palms scoring at least `min_score`.
///
/// `regressors` holds 18 values per anchor in input pixels, `scores` one
/// logit per anchor.
pub fn decode_palms(
    regressors: &[f32],
    scores: &[f32],
    anchors: &[Anchor],
    input_size: f32,
    min_score: f32,
) -> InferenceResult<Vec<PalmDetection>> {
    if scores.len() != anchors.len() || regressors.len() != anchors.len() * REGRESSOR_STRIDE {
        return Err(InferenceError::inference_failed(format!(
            "palm outputs do not match {} anchors: {} scores, {} regressor values",
            anchors.len(),
            scores.len(),
            regressors.len()
        )));
    }

    let mut palms = Vec::new();
    for ((anchor, &logit), raw) in anchors
        .iter()
        .zip(scores)
        .zip(regressors.chunks_exact(REGRESSOR_STRIDE))
    {
        let score = sigmoid(logit);
        if score.is_nan() || score < min_score {
            continue;
        }

        let mut keypoints = [(0.0, 0.0); PALM_KEYPOINTS];
        for (k, point) in keypoints.iter_mut().enumerate() {
            *point = (
                raw[4 + 2 * k] / input_size + anchor.x,
                raw[5 + 2 * k] / input_size + anchor.y,
            );
        }

        palms.push(PalmDetection {
            score,
            x_center: raw[0] / input_size + anchor.x,
            y_center: raw[1] / input_size + anchor.y,
            width: raw[2] / input_size,
            height: raw[3] / input_size,
            keypoints,
        });
    }

    Ok(palms)
}

/// Weighted non-maximum suppression.
///
/// Each cluster of detections overlapping the current best by more than
/// `threshold` IoU collapses into one, with box and keypoints averaged by
/// score. The merged detection keeps the best score. Output is sorted by
/// score, descending.
pub fn weighted_nms(mut detections: Vec<PalmDetection>, threshold: f32) -> Vec<PalmDetection> {
    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut merged = Vec::new();
    while !detections.is_empty() {
        let best = detections.remove(0);
        let (mut cluster, rest): (Vec<_>, Vec<_>) = detections
            .into_iter()
            .partition(|d| best.iou(d) > threshold);
        detections = rest;

        let total: f32 = best.score + cluster.iter().map(|d| d.score).sum::<f32>();
        if !total.is_finite() || total <= 0.0 {
            merged.push(best);
            continue;
        }

        let mut out = PalmDetection {
            score: best.score,
            x_center: 0.0,
            y_center: 0.0,
            width: 0.0,
            height: 0.0,
            keypoints: [(0.0, 0.0); PALM_KEYPOINTS],
        };
        cluster.push(best);
        for d in &cluster {
            let w = d.score / total;
            out.x_center += d.x_center * w;
            out.y_center += d.y_center * w;
            out.width += d.width * w;
            out.height += d.height * w;
            for (acc, kp) in out.keypoints.iter_mut().zip(d.keypoints.iter()) {
                acc.0 += kp.0 * w;
                acc.1 += kp.1 * w;
            }
        }
        merged.push(out);
    }

    merged
}

/// Placement of the image inside the square, zero-padded model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    size: f32,
    scale_x: f32,
    scale_y: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    /// Scale `rgb` to fit a `size` square, keeping aspect ratio, centered.
    pub fn fit(rgb: &RgbImage, size: u32) -> (RgbImage, Letterbox) {
        let (w, h) = (rgb.width().max(1), rgb.height().max(1));
        let scale = size as f32 / w.max(h) as f32;
        let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
        let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);

        let resized = imageops::resize(rgb, new_w, new_h, FilterType::Triangle);
        let pad_x = (size - new_w) / 2;
        let pad_y = (size - new_h) / 2;

        let mut canvas = RgbImage::new(size, size);
        imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);

        (
            canvas,
            Letterbox {
                size: size as f32,
                scale_x: new_w as f32 / w as f32,
                scale_y: new_h as f32 / h as f32,
                pad_x: pad_x as f32,
                pad_y: pad_y as f32,
            },
        )
    }

    /// Normalized letterbox point → image pixels.
    pub fn point_to_image(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x * self.size - self.pad_x) / self.scale_x,
            (y * self.size - self.pad_y) / self.scale_y,
        )
    }

    /// Normalized letterbox detection → image pixels.
    pub fn palm_to_image(&self, palm: &PalmDetection) -> PalmDetection {
        let (x_center, y_center) = self.point_to_image(palm.x_center, palm.y_center);
        let mut keypoints = palm.keypoints;
        for kp in keypoints.iter_mut() {
            *kp = self.point_to_image(kp.0, kp.1);
        }
        PalmDetection {
            score: palm.score,
            x_center,
            y_center,
            width: palm.width * self.size / self.scale_x,
            height: palm.height * self.size / self.scale_y,
            keypoints,
        }
    }
}

/// Palm detector backed by ONNX Runtime.
pub struct OrtPalmDetector {
    session: Mutex<Session>,
    anchors: Vec<Anchor>,
    config: PalmDetectorConfig,
}

impl OrtPalmDetector {
    /// Load the palm model. Failures are attributed to the hand detector.
    pub fn new(config: PalmDetectorConfig) -> Result<Self, StartupError> {
        let session = create_session(&config.model_path, StartupComponent::HandDetector)?;
        let anchors = generate_anchors(config.input_size, &config.strides);
        info!(
            model_path = %config.model_path.display(),
            anchors = anchors.len(),
            "Palm detector initialized"
        );
        Ok(Self {
            session: Mutex::new(session),
            anchors,
            config,
        })
    }

    pub fn config(&self) -> &PalmDetectorConfig {
        &self.config
    }

    /// Palms scoring at least `min_score`, in image pixels, best first.
    pub fn detect(&self, grid: &PixelGrid, min_score: f32) -> InferenceResult<Vec<PalmDetection>> {
        let size = self.config.input_size;
        let (square, letterbox) = Letterbox::fit(grid.as_rgb(), size);

        let data: Vec<f32> = square.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        let shape = vec![1usize, size as usize, size as usize, 3];
        let input = Tensor::from_array((shape, data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| InferenceError::inference_failed(format!("ORT tensor: {e}")))?;

        let (regressors, scores) = self.run_inference(input)?;
        let candidates =
            decode_palms(&regressors, &scores, &self.anchors, size as f32, min_score)?;
        let candidate_count = candidates.len();
        let palms: Vec<_> = weighted_nms(candidates, self.config.min_suppression_threshold)
            .iter()
            .map(|palm| letterbox.palm_to_image(palm))
            .collect();

        debug!(
            candidates = candidate_count,
            palms = palms.len(),
            "Palm detection finished"
        );
        Ok(palms)
    }

    /// Run the model and return (regressors, score logits).
    fn run_inference(&self, input: Value) -> InferenceResult<(Vec<f32>, Vec<f32>)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::inference_failed("palm detector session poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| InferenceError::inference_failed(format!("ORT run failed: {e}")))?;

        let extract = |name: &str| -> InferenceResult<Vec<f32>> {
            Ok(outputs
                .get(name)
                .ok_or_else(|| InferenceError::inference_failed(format!("missing {name} tensor")))?
                .try_extract_tensor::<f32>()
                .map_err(|e| InferenceError::inference_failed(format!("ORT extract: {e}")))?
                .1
                .to_vec())
        };

        let regressors = extract(&self.config.regressors_output)?;
        let scores = extract(&self.config.scores_output)?;
        Ok((regressors, scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn palm(score: f32, x: f32, y: f32, size: f32) -> PalmDetection {
        PalmDetection {
            score,
            x_center: x,
            y_center: y,
            width: size,
            height: size,
            keypoints: [(x, y); PALM_KEYPOINTS],
        }
    }

    #[test]
    fn test_default_anchor_layout() {
        let anchors = generate_anchors(192, &[8, 16, 16, 16]);
        assert_eq!(anchors.len(), 24 * 24 * 2 + 12 * 12 * 6);

        assert_eq!(anchors[0], Anchor { x: 0.5 / 24.0, y: 0.5 / 24.0 });
        assert_eq!(anchors[0], anchors[1]);
        assert_eq!(anchors[2].x, 1.5 / 24.0);

        let coarse = anchors[24 * 24 * 2];
        assert_eq!(coarse, Anchor { x: 0.5 / 12.0, y: 0.5 / 12.0 });
        assert_eq!(anchors[24 * 24 * 2 + 5], coarse);
    }

    #[test]
    fn test_zero_stride_is_skipped() {
        assert_eq!(generate_anchors(16, &[0, 8]).len(), 2 * 2 * 2);
    }

    #[test]
    fn test_decode_applies_score_threshold() {
        let anchors = vec![
            Anchor { x: 0.25, y: 0.25 },
            Anchor { x: 0.5, y: 0.5 },
            Anchor { x: 0.75, y: 0.75 },
        ];
        let mut regressors = vec![0.0; 3 * REGRESSOR_STRIDE];
        // Anchor 1: box shifted by +19.2 px, 96 px wide, wrist keypoint at -9.6 px
        regressors[REGRESSOR_STRIDE] = 19.2;
        regressors[REGRESSOR_STRIDE + 2] = 96.0;
        regressors[REGRESSOR_STRIDE + 3] = 96.0;
        regressors[REGRESSOR_STRIDE + 4] = -9.6;

        let scores = vec![-5.0, 3.0, 0.1];
        let palms = decode_palms(&regressors, &scores, &anchors, 192.0, 0.5).unwrap();

        assert_eq!(palms.len(), 2);
        let first = &palms[0];
        assert!((first.x_center - 0.6).abs() < 1e-6);
        assert!((first.y_center - 0.5).abs() < 1e-6);
        assert!((first.width - 0.5).abs() < 1e-6);
        assert!((first.keypoints[WRIST_KEYPOINT].0 - 0.45).abs() < 1e-6);
        assert!((first.score - sigmoid(3.0)).abs() < 1e-6);
        assert!(palms[1].score < first.score);
    }

    #[test]
    fn test_extreme_logits_are_clipped() {
        assert_eq!(sigmoid(1.0e6), sigmoid(SCORE_CLIPPING_THRESH));
        assert!(sigmoid(-1.0e6) >= 0.0);
        assert!(sigmoid(1.0e6).is_finite());
    }

    #[test]
    fn test_decode_rejects_mismatched_outputs() {
        let anchors = vec![Anchor { x: 0.5, y: 0.5 }; 2];
        let err = decode_palms(&[0.0; 18], &[0.0, 0.0], &anchors, 192.0, 0.5).unwrap_err();
        assert!(matches!(err, InferenceError::InferenceFailure(_)));
    }

    #[test]
    fn test_weighted_nms_merges_overlaps() {
        let merged = weighted_nms(
            vec![
                palm(0.6, 0.52, 0.5, 0.2),
                palm(0.9, 0.5, 0.5, 0.2),
                palm(0.8, 0.1, 0.1, 0.1),
            ],
            0.3,
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].score, 0.9);
        let expected_x = (0.5 * 0.9 + 0.52 * 0.6) / 1.5;
        assert!((merged[0].x_center - expected_x).abs() < 1e-6);
        assert!((merged[0].keypoints[0].0 - expected_x).abs() < 1e-6);
        assert_eq!(merged[1], palm(0.8, 0.1, 0.1, 0.1));
    }

    #[test]
    fn test_weighted_nms_keeps_degenerate_box() {
        let merged = weighted_nms(vec![palm(0.7, 0.5, 0.5, 0.0)], 0.3);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_letterbox_wide_image() {
        let rgb = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        let (square, letterbox) = Letterbox::fit(&rgb, 192);

        assert_eq!(square.dimensions(), (192, 192));
        assert_eq!(square.get_pixel(96, 10), &Rgb([0, 0, 0]));
        assert!(square.get_pixel(96, 96).0.iter().all(|&c| c > 250));

        let (x, y) = letterbox.point_to_image(0.5, 0.5);
        assert!((x - 100.0).abs() < 1e-3);
        assert!((y - 50.0).abs() < 1e-3);

        let mapped = letterbox.palm_to_image(&palm(0.9, 0.5, 0.5, 0.25));
        assert!((mapped.width - 50.0).abs() < 1e-3);
        assert!((mapped.keypoints[0].1 - 50.0).abs() < 1e-3);
    }
}
