//! Hand landmarks and the flattened classifier feature vector.

use handsign_models::{HandJoint, HAND_LANDMARK_COUNT};
use ndarray::Array2;

use crate::error::{InferenceError, InferenceResult};

/// Number of values in a [`FeatureVector`] (21 points × x, y, z).
pub const FEATURE_LEN: usize = HAND_LANDMARK_COUNT * 3;

/// Single hand landmark in normalized image coordinates.
///
/// `x` and `y` are relative to image width and height. `z` is depth relative
/// to the wrist on roughly the same scale as `x`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Ordered landmarks reported for one hand.
///
/// Order is semantic: point `i` is joint `HandJoint::ALL[i]`. The set keeps
/// whatever the detector produced; length is validated when vectorizing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LandmarkSet {
    points: Vec<LandmarkPoint>,
}

impl LandmarkSet {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when the set has exactly one point per hand joint.
    pub fn is_complete(&self) -> bool {
        self.points.len() == HAND_LANDMARK_COUNT
    }

    /// Landmark for a joint, if present.
    pub fn joint(&self, joint: HandJoint) -> Option<&LandmarkPoint> {
        self.points.get(joint.index())
    }
}

impl From<Vec<LandmarkPoint>> for LandmarkSet {
    fn from(points: Vec<LandmarkPoint>) -> Self {
        Self::new(points)
    }
}

/// Flattened `x0, y0, z0, x1, y1, z1, ...` classifier input.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f32; FEATURE_LEN],
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        FEATURE_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Single-row `1 × 63` tensor for the classifier.
    pub fn to_input_tensor(&self) -> Array2<f32> {
        Array2::from_shape_fn((1, FEATURE_LEN), |(_, col)| self.values[col])
    }
}

impl TryFrom<&LandmarkSet> for FeatureVector {
    type Error = InferenceError;

    fn try_from(set: &LandmarkSet) -> Result<Self, Self::Error> {
        build_feature_vector(set)
    }
}

/// Flatten a landmark set into a [`FeatureVector`].
///
/// Landmark `i` lands at positions `3i`, `3i + 1`, `3i + 2` as x, y, z.
/// Any set that does not hold exactly 21 points is rejected.
pub fn build_feature_vector(set: &LandmarkSet) -> InferenceResult<FeatureVector> {
    if !set.is_complete() {
        return Err(InferenceError::MalformedLandmarkSet {
            expected: HAND_LANDMARK_COUNT,
            actual: set.len(),
        });
    }

    let mut values = [0.0f32; FEATURE_LEN];
    for (slot, point) in values.chunks_exact_mut(3).zip(set.points()) {
        slot[0] = point.x;
        slot[1] = point.y;
        slot[2] = point.z;
    }

    Ok(FeatureVector { values })
}
