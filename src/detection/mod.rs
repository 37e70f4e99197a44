// src/detection/mod.rs
//
// Per-frame perception. Everything here is a pure function of the current
// frame and static configuration; nothing is carried between frames.

pub mod entity_detector;
pub mod lane_segmenter;
pub mod player_locator;
pub mod profiles;

pub use entity_detector::{Detections, EntityDetector};
pub use lane_segmenter::{LaneConfig, LaneSegmenter};
pub use player_locator::{PlayerLocator, PlayerState, ProbeConfig};
pub use profiles::{AreaRange, DetectionProfile, ProfileTable, WidthRange};
