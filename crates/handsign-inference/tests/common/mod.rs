//! Shared fakes and fixtures for pipeline tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use handsign_inference::{
    ClassifierEngine, HandLandmarkDetector, InferenceError, InferenceResult, LabelTable,
    LandmarkPoint, LandmarkSet, PixelGrid, PredictionPipeline, FEATURE_LEN,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array2;

/// Detector returning a fixed list of hands for every image.
pub struct FixedDetector {
    pub hands: Vec<LandmarkSet>,
    pub calls: AtomicUsize,
}

impl FixedDetector {
    pub fn new(hands: Vec<LandmarkSet>) -> Self {
        Self {
            hands,
            calls: AtomicUsize::new(0),
        }
    }
}

impl HandLandmarkDetector for FixedDetector {
    fn detect(&self, _grid: &PixelGrid) -> InferenceResult<Vec<LandmarkSet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hands.clone())
    }
}

/// Detector that sees nothing in single-colour images and one hand otherwise.
pub struct ContrastDetector;

impl HandLandmarkDetector for ContrastDetector {
    fn detect(&self, grid: &PixelGrid) -> InferenceResult<Vec<LandmarkSet>> {
        let mut pixels = grid.as_rgb().pixels();
        let first = pixels.next().copied();
        if pixels.all(|p| Some(*p) == first) {
            Ok(Vec::new())
        } else {
            Ok(vec![hand(0.5)])
        }
    }
}

/// Detector whose engine always errors.
pub struct FailingDetector;

impl HandLandmarkDetector for FailingDetector {
    fn detect(&self, _grid: &PixelGrid) -> InferenceResult<Vec<LandmarkSet>> {
        Err(InferenceError::inference_failed("detector engine crashed"))
    }
}

/// Classifier returning fixed scores and remembering the last input row.
pub struct FixedClassifier {
    pub scores: Vec<f32>,
    pub output_len: usize,
    pub last_input: std::sync::Mutex<Option<Vec<f32>>>,
}

impl FixedClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        let output_len = scores.len();
        Self {
            scores,
            output_len,
            last_input: std::sync::Mutex::new(None),
        }
    }

    /// Advertise `output_len` classes while returning `scores`.
    pub fn misreporting(scores: Vec<f32>, output_len: usize) -> Self {
        Self {
            output_len,
            ..Self::new(scores)
        }
    }
}

impl ClassifierEngine for FixedClassifier {
    fn classify(&self, input: &Array2<f32>) -> InferenceResult<Vec<f32>> {
        assert_eq!(input.shape(), [1, FEATURE_LEN]);
        *self.last_input.lock().unwrap() = Some(input.iter().copied().collect());
        Ok(self.scores.clone())
    }

    fn output_len(&self) -> usize {
        self.output_len
    }
}

/// Classifier whose engine always errors.
pub struct FailingClassifier {
    pub output_len: usize,
}

impl ClassifierEngine for FailingClassifier {
    fn classify(&self, _input: &Array2<f32>) -> InferenceResult<Vec<f32>> {
        Err(InferenceError::inference_failed("classifier engine crashed"))
    }

    fn output_len(&self) -> usize {
        self.output_len
    }
}

/// 21 identical points.
pub fn hand(value: f32) -> LandmarkSet {
    LandmarkSet::new(vec![LandmarkPoint::new(value, value, value); 21])
}

/// 21 points with distinct coordinates: point `i` is `(i, i + 0.25, -i)`.
pub fn ordered_hand() -> LandmarkSet {
    LandmarkSet::new(
        (0..21)
            .map(|i| {
                let i = i as f32;
                LandmarkPoint::new(i, i + 0.25, -i)
            })
            .collect(),
    )
}

pub fn labels(names: &[&str]) -> Arc<LabelTable> {
    Arc::new(LabelTable::from_labels(names.iter().copied()).unwrap())
}

pub fn pipeline(
    detector: impl HandLandmarkDetector + 'static,
    classifier: impl ClassifierEngine + 'static,
    names: &[&str],
) -> PredictionPipeline {
    PredictionPipeline::new(Arc::new(detector), Arc::new(classifier), labels(names)).unwrap()
}

/// Encode an image as PNG.
pub fn png(image: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Single-colour PNG.
pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    png(&RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
}

/// PNG with a dark square in the middle of a white field.
pub fn contrast_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let inside = x > width / 4 && x < 3 * width / 4 && y > height / 4 && y < 3 * height / 4;
        if inside {
            Rgb([40, 30, 20])
        } else {
            Rgb([255, 255, 255])
        }
    });
    png(&image)
}
