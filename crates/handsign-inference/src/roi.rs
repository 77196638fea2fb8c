//! Hand region of interest derived from a palm detection.
//!
//! The palm box is rotated so the wrist → middle finger axis points up,
//! shifted toward the fingers, and grown into a square large enough to hold
//! the whole hand. The landmark model runs on that rotated square and its
//! output is projected back into image coordinates.

use std::f32::consts::{FRAC_PI_2, PI};

use image::RgbImage;

use crate::landmarks::LandmarkPoint;
use crate::palm::{PalmDetection, MIDDLE_MCP_KEYPOINT, WRIST_KEYPOINT};

/// Square side relative to the palm box's long side.
const ROI_SCALE: f32 = 2.6;

/// Shift along the hand axis, in palm box heights (negative is toward the fingers).
const ROI_SHIFT_Y: f32 = -0.5;

/// Rotated square in image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandRoi {
    pub x_center: f32,
    pub y_center: f32,
    pub size: f32,
    /// Clockwise rotation in radians, in `[-π, π)`
    pub rotation: f32,
}

fn normalize_radians(angle: f32) -> f32 {
    angle - 2.0 * PI * ((angle + PI) / (2.0 * PI)).floor()
}

impl HandRoi {
    /// Build the crop for a palm given in image pixels.
    pub fn from_palm(palm: &PalmDetection) -> Self {
        let (x0, y0) = palm.keypoints[WRIST_KEYPOINT];
        let (x1, y1) = palm.keypoints[MIDDLE_MCP_KEYPOINT];
        let rotation = normalize_radians(FRAC_PI_2 - (-(y1 - y0)).atan2(x1 - x0));

        let (sin, cos) = rotation.sin_cos();
        let shift = palm.height * ROI_SHIFT_Y;

        Self {
            x_center: palm.x_center - shift * sin,
            y_center: palm.y_center + shift * cos,
            size: palm.width.max(palm.height) * ROI_SCALE,
            rotation,
        }
    }

    /// Crop-relative offset → image pixels.
    fn offset_to_image(&self, dx: f32, dy: f32) -> (f32, f32) {
        let (sin, cos) = self.rotation.sin_cos();
        (
            self.x_center + dx * cos - dy * sin,
            self.y_center + dx * sin + dy * cos,
        )
    }

    /// Sample the rotated square into an `out_size` × `out_size` NHWC buffer
    /// with values in `[0, 1]`. Pixels outside the image read as black.
    pub fn crop(&self, rgb: &RgbImage, out_size: u32) -> Vec<f32> {
        let n = out_size as f32;
        let mut data = Vec::with_capacity((out_size * out_size * 3) as usize);

        for v in 0..out_size {
            for u in 0..out_size {
                let dx = ((u as f32 + 0.5) / n - 0.5) * self.size;
                let dy = ((v as f32 + 0.5) / n - 0.5) * self.size;
                let (sx, sy) = self.offset_to_image(dx, dy);
                let pixel = sample_bilinear(rgb, sx - 0.5, sy - 0.5);
                data.extend(pixel.iter().map(|c| c / 255.0));
            }
        }

        data
    }

    /// Crop-normalized landmark → image-normalized landmark.
    ///
    /// `z` is rescaled by the crop size relative to the image width, the
    /// same scale as `x`.
    pub fn project(&self, point: LandmarkPoint, width: u32, height: u32) -> LandmarkPoint {
        let (x, y) =
            self.offset_to_image((point.x - 0.5) * self.size, (point.y - 0.5) * self.size);
        LandmarkPoint::new(
            x / width as f32,
            y / height as f32,
            point.z * self.size / width as f32,
        )
    }
}

fn sample_bilinear(rgb: &RgbImage, fx: f32, fy: f32) -> [f32; 3] {
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;

    let fetch = |x: f32, y: f32| -> [f32; 3] {
        if x < 0.0 || y < 0.0 || x >= rgb.width() as f32 || y >= rgb.height() as f32 {
            return [0.0; 3];
        }
        let p = rgb.get_pixel(x as u32, y as u32).0;
        [p[0] as f32, p[1] as f32, p[2] as f32]
    };

    let tl = fetch(x0, y0);
    let tr = fetch(x0 + 1.0, y0);
    let bl = fetch(x0, y0 + 1.0);
    let br = fetch(x0 + 1.0, y0 + 1.0);

    let mut out = [0.0; 3];
    for c in 0..3 {
        let top = tl[c] + (tr[c] - tl[c]) * tx;
        let bottom = bl[c] + (br[c] - bl[c]) * tx;
        out[c] = top + (bottom - top) * ty;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palm::PALM_KEYPOINTS;
    use image::Rgb;

    fn palm_pointing(wrist: (f32, f32), middle: (f32, f32)) -> PalmDetection {
        let mut keypoints = [wrist; PALM_KEYPOINTS];
        keypoints[MIDDLE_MCP_KEYPOINT] = middle;
        PalmDetection {
            score: 0.9,
            x_center: 100.0,
            y_center: 180.0,
            width: 40.0,
            height: 40.0,
            keypoints,
        }
    }

    #[test]
    fn test_upright_palm() {
        let roi = HandRoi::from_palm(&palm_pointing((100.0, 200.0), (100.0, 150.0)));
        assert!(roi.rotation.abs() < 1e-6);
        assert!((roi.x_center - 100.0).abs() < 1e-4);
        assert!((roi.y_center - 160.0).abs() < 1e-4);
        assert!((roi.size - 104.0).abs() < 1e-4);
    }

    #[test]
    fn test_palm_pointing_right_shifts_right() {
        let roi = HandRoi::from_palm(&palm_pointing((80.0, 180.0), (120.0, 180.0)));
        assert!((roi.rotation - FRAC_PI_2).abs() < 1e-6);
        assert!((roi.x_center - 120.0).abs() < 1e-4);
        assert!((roi.y_center - 180.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotation_is_wrapped() {
        let roi = HandRoi::from_palm(&palm_pointing((100.0, 150.0), (100.0, 200.0)));
        assert!((-PI..=PI).contains(&roi.rotation));
        assert!((roi.rotation.abs() - PI).abs() < 1e-5);
    }

    #[test]
    fn test_project_center_and_top() {
        let roi = HandRoi {
            x_center: 50.0,
            y_center: 40.0,
            size: 20.0,
            rotation: FRAC_PI_2,
        };

        let center = roi.project(LandmarkPoint::new(0.5, 0.5, 0.5), 100, 80);
        assert!((center.x - 0.5).abs() < 1e-6);
        assert!((center.y - 0.5).abs() < 1e-6);
        assert!((center.z - 0.1).abs() < 1e-6);

        // Top of the crop is image +x when the hand points right
        let top = roi.project(LandmarkPoint::new(0.5, 0.0, 0.0), 100, 80);
        assert!((top.x - 0.6).abs() < 1e-5);
        assert!((top.y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_crop_uniform_interior() {
        let rgb = RgbImage::from_pixel(64, 64, Rgb([255, 0, 0]));
        let roi = HandRoi {
            x_center: 32.0,
            y_center: 32.0,
            size: 32.0,
            rotation: 0.3,
        };
        let data = roi.crop(&rgb, 8);
        assert_eq!(data.len(), 8 * 8 * 3);
        for px in data.chunks_exact(3) {
            assert!((px[0] - 1.0).abs() < 1e-5);
            assert!(px[1].abs() < 1e-5);
        }
    }

    #[test]
    fn test_crop_follows_rotation() {
        // Left half black, right half white
        let rgb = RgbImage::from_fn(64, 64, |x, _| {
            if x < 32 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let roi = HandRoi {
            x_center: 32.0,
            y_center: 32.0,
            size: 32.0,
            rotation: FRAC_PI_2,
        };
        let data = roi.crop(&rgb, 16);
        let at = |u: usize, v: usize| data[(v * 16 + u) * 3];

        assert!(at(8, 1) > 0.99);
        assert!(at(8, 14) < 0.01);
    }

    #[test]
    fn test_crop_outside_image_is_black() {
        let rgb = RgbImage::from_pixel(16, 16, Rgb([255, 255, 255]));
        let roi = HandRoi {
            x_center: 200.0,
            y_center: 200.0,
            size: 10.0,
            rotation: 0.0,
        };
        assert!(roi.crop(&rgb, 4).iter().all(|&v| v == 0.0));
    }
}
