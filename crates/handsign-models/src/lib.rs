//! Shared data models for the HandSign gesture classifier.
//!
//! This crate provides:
//! - Hand joint topology (21-point hand landmark layout)
//! - Prediction outcomes and their Serde wire representation
//! - The per-request error taxonomy

pub mod hand_joint;
pub mod prediction;

// Re-export common types
pub use hand_joint::{HandJoint, HAND_LANDMARK_COUNT};
pub use prediction::{
    ErrorKind, Prediction, PredictionResponse, ERROR_PREDICTION, NO_HAND_CONFIDENCE,
    NO_HAND_PREDICTION,
};
