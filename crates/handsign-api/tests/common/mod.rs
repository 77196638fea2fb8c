//! Router fixtures: fake engines, app state builders, multipart bodies.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use handsign_api::{create_router, ApiConfig, AppState};
use handsign_inference::{
    ClassifierEngine, HandLandmarkDetector, InferenceResult, LabelTable, LandmarkPoint,
    LandmarkSet, PixelGrid, PredictionPipeline, StartupError,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array2;

pub const BOUNDARY: &str = "handsign-test-boundary";

/// Finds one hand unless every pixel has the same colour.
pub struct ContrastDetector;

impl HandLandmarkDetector for ContrastDetector {
    fn detect(&self, grid: &PixelGrid) -> InferenceResult<Vec<LandmarkSet>> {
        let mut pixels = grid.as_rgb().pixels();
        let first = pixels.next().copied();
        if pixels.all(|p| Some(*p) == first) {
            return Ok(Vec::new());
        }
        Ok(vec![LandmarkSet::new(vec![
            LandmarkPoint::new(0.5, 0.5, 0.0);
            21
        ])])
    }
}

/// Detector that blocks for a fixed time before finding nothing.
pub struct SlowDetector(pub Duration);

impl HandLandmarkDetector for SlowDetector {
    fn detect(&self, _grid: &PixelGrid) -> InferenceResult<Vec<LandmarkSet>> {
        std::thread::sleep(self.0);
        Ok(Vec::new())
    }
}

pub struct FixedClassifier(pub Vec<f32>);

impl ClassifierEngine for FixedClassifier {
    fn classify(&self, _input: &Array2<f32>) -> InferenceResult<Vec<f32>> {
        Ok(self.0.clone())
    }

    fn output_len(&self) -> usize {
        self.0.len()
    }
}

pub fn test_config() -> ApiConfig {
    ApiConfig {
        metrics_enabled: false,
        ..ApiConfig::default()
    }
}

pub fn pipeline_with(detector: impl HandLandmarkDetector + 'static) -> PredictionPipeline {
    PredictionPipeline::new(
        Arc::new(detector),
        Arc::new(FixedClassifier(vec![0.1, 0.85, 0.05])),
        Arc::new(LabelTable::from_labels(["A", "B", "C"]).unwrap()),
    )
    .unwrap()
}

pub fn ready_router(config: ApiConfig) -> Router {
    create_router(
        AppState::ready(config, pipeline_with(ContrastDetector)),
        None,
    )
}

pub fn failed_router(err: StartupError) -> Router {
    failed_router_with(test_config(), err)
}

pub fn failed_router_with(config: ApiConfig, err: StartupError) -> Router {
    create_router(AppState::failed(config, &err), None)
}

pub fn png(image: RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn blank_png() -> Vec<u8> {
    png(RgbImage::from_pixel(32, 32, Rgb([255, 255, 255])))
}

pub fn hand_png() -> Vec<u8> {
    png(RgbImage::from_fn(32, 32, |x, _| {
        if x < 16 {
            Rgb([200, 160, 120])
        } else {
            Rgb([255, 255, 255])
        }
    }))
}

/// Single-field multipart body.
pub fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"upload.png\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn predict_request(field: &str, bytes: &[u8]) -> Request<Body> {
    let body = multipart_body(field, bytes);
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
