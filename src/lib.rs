// src/lib.rs
//
// Perception-to-action pipeline for a River Raid playing agent: pixels in,
// button presses out.

pub mod analysis;
pub mod color_analysis;
pub mod config;
pub mod controls;
pub mod decision_engine;
pub mod detection;
pub mod frame_source;
pub mod overlay;
pub mod pipeline;
pub mod types;

pub use controls::{ButtonMask, CommandSink};
pub use decision_engine::{DecisionConfig, DecisionEngine};
pub use pipeline::{FrameReport, PipelineOrchestrator, Scene};
pub use types::{Command, CommandToken, Config, Entity, EntityKind, Frame, PressMode};
