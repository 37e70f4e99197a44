// src/analysis/mod.rs
//
// State carried between frames.
//
// Signal flow:
//   EntityDetector hostiles → identity_tracker → trajectory_predictor ─→ Scene
//
// The tracker owns the set of TrackedHostiles; the predictor is the only
// writer of their Kalman state and predicted intercept.

pub mod identity_tracker;
pub mod trajectory_predictor;

pub use identity_tracker::{IdentityTracker, TrackedHostile, TrackingConfig};
pub use trajectory_predictor::{KalmanTrack, TrajectoryConfig, TrajectoryPredictor};
