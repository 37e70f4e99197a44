// src/pipeline/orchestrator.rs
//
// One tick of the agent:
//
//   Frame ─→ ROI crop ─→ HSV (once) ─┬→ PlayerLocator ──┐
//                                    ├→ EntityDetector ─┼→ IdentityTracker → TrajectoryPredictor
//                                    └→ LaneSegmenter ──┘                          │
//                                                                                  ▼
//                                                       Scene ─→ DecisionEngine ─→ commands
//
// Every step that can fail (frame validation, ROI crop, image processing,
// lane scan row) runs before the tracker, predictor or engine is touched, so
// a rejected frame leaves the pipeline exactly as it was.

use super::frame_context::{FrameContext, Scene};
use super::metrics::PipelineMetrics;
use crate::analysis::identity_tracker::IdentityTracker;
use crate::analysis::trajectory_predictor::TrajectoryPredictor;
use crate::color_analysis::HsvImage;
use crate::decision_engine::DecisionEngine;
use crate::detection::entity_detector::{Detections, EntityDetector};
use crate::detection::lane_segmenter::LaneSegmenter;
use crate::detection::player_locator::{PlayerLocator, PlayerState};
use crate::types::{Command, CommandToken, Config, EntityKind, Frame, LaneSegment};
use anyhow::{Context, Result};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-frame summary, one JSON line in the replay output.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub frame_id: u64,
    pub timestamp_ms: f64,
    pub elapsed_ms: u64,
    pub player: PlayerState,
    pub hostiles: Vec<HostileReport>,
    pub fuel_count: usize,
    pub lanes: Vec<LaneSegment>,
    pub commands: Vec<Command>,
    pub processing_us: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostileReport {
    pub id: u32,
    pub kind: EntityKind,
    pub x: i32,
    pub y: i32,
    pub predicted_intercept_x: Option<f32>,
}

/// Output of the per-frame perception stages.
struct Perception {
    player: PlayerState,
    detections: Detections,
    lanes: Vec<LaneSegment>,
}

pub struct PipelineOrchestrator {
    config: Config,
    tracker: IdentityTracker,
    predictor: TrajectoryPredictor,
    engine: DecisionEngine,
    metrics: PipelineMetrics,
    context: Option<FrameContext>,
    frame_count: u64,
}

impl PipelineOrchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            tracker: IdentityTracker::new(config.tracking.clone()),
            predictor: TrajectoryPredictor::new(config.trajectory.clone()),
            engine: DecisionEngine::new(config.decision.clone()),
            metrics: PipelineMetrics::new(),
            context: None,
            frame_count: 0,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn set_running(&mut self, running: bool) {
        self.engine.set_running(running);
    }

    /// Scene of the last processed frame.
    pub fn scene(&self) -> Option<Scene<'_>> {
        self.context
            .as_ref()
            .map(|ctx| ctx.scene(self.tracker.tracks()))
    }

    /// Run the full pipeline on one frame. `elapsed` is the time since the
    /// agent was booted and only drives the START delay.
    pub fn process_frame(&mut self, frame: &Frame, elapsed: Duration) -> Result<FrameReport> {
        let started = Instant::now();

        let perception = match self.perceive(frame) {
            Ok(p) => p,
            Err(e) => {
                self.metrics.inc(&self.metrics.rejected_frames);
                warn!("⚠️ Frame rejected: {:#}", e);
                return Err(e);
            }
        };

        let frame_id = self.frame_count;
        self.frame_count += 1;
        self.record_perception(&perception);

        let Perception {
            player,
            detections,
            lanes,
        } = perception;

        for hostile in self.tracker.reconcile(detections.hostiles).iter_mut() {
            self.predictor.update(hostile);
        }

        let mut context = FrameContext::new(frame_id, frame.timestamp_ms, player);
        context.fuels = detections.fuels;
        context.lanes = lanes;

        let commands = self
            .engine
            .decide(&context.scene(self.tracker.tracks()), elapsed);
        self.record_commands(&commands);

        let hostiles = self
            .tracker
            .tracks()
            .iter()
            .map(|h| HostileReport {
                id: h.id(),
                kind: h.entity().kind(),
                x: h.entity().x(),
                y: h.entity().y(),
                predicted_intercept_x: h.predicted_intercept_x(),
            })
            .collect();

        let processing_us = started.elapsed().as_micros() as u64;
        self.metrics.set_frame_time(processing_us);

        debug!(
            "🖼️ frame {} processed in {} µs, commands {:?}",
            frame_id,
            processing_us,
            commands.iter().map(|c| c.token).collect::<Vec<_>>()
        );

        let report = FrameReport {
            frame_id,
            timestamp_ms: frame.timestamp_ms,
            elapsed_ms: elapsed.as_millis() as u64,
            player: context.player.clone(),
            hostiles,
            fuel_count: context.fuels.len(),
            lanes: context.lanes.clone(),
            commands,
            processing_us,
        };
        self.context = Some(context);
        Ok(report)
    }

    /// Everything that only depends on the frame. Fails without side effects.
    fn perceive(&self, frame: &Frame) -> Result<Perception> {
        frame.validate()?;
        let roi = frame
            .crop_rows(self.config.frame.roi_top, self.config.frame.roi_bottom)
            .context("cropping region of interest")?;
        let hsv = HsvImage::from_frame(&roi).context("converting to HSV")?;

        let lanes = LaneSegmenter::new(&self.config.lanes).segment(&hsv)?;
        let player =
            PlayerLocator::new(&self.config.profiles.player, &self.config.player).locate(&hsv)?;
        let detections = EntityDetector::new(&self.config.profiles).detect(&hsv)?;

        Ok(Perception {
            player,
            detections,
            lanes,
        })
    }

    fn record_perception(&self, perception: &Perception) {
        let m = &self.metrics;
        m.inc(&m.total_frames);
        if perception.player.is_present() {
            m.inc(&m.frames_with_player);
        }
        for entity in perception
            .detections
            .hostiles
            .iter()
            .chain(&perception.detections.fuels)
        {
            m.record_detection(entity.kind());
        }
    }

    fn record_commands(&self, commands: &[Command]) {
        let m = &self.metrics;
        for command in commands {
            match command.token {
                CommandToken::Fire => m.inc(&m.fires),
                CommandToken::Up => m.inc(&m.dodges),
                CommandToken::Left | CommandToken::Right => m.inc(&m.moves),
                _ => {}
            }
        }
    }
}
