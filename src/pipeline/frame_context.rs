// src/pipeline/frame_context.rs
//
// Everything perceived on one frame. Rebuilt from scratch every tick; the
// only thing that outlives it is the tracked hostile set, which the
// IdentityTracker owns and the Scene merely borrows.

use crate::analysis::identity_tracker::TrackedHostile;
use crate::detection::player_locator::PlayerState;
use crate::types::{Entity, LaneSegment};

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub frame_id: u64,
    pub timestamp_ms: f64,
    pub player: PlayerState,
    pub fuels: Vec<Entity>,
    pub lanes: Vec<LaneSegment>,
}

impl FrameContext {
    pub fn new(frame_id: u64, timestamp_ms: f64, player: PlayerState) -> Self {
        Self {
            frame_id,
            timestamp_ms,
            player,
            fuels: Vec::new(),
            lanes: Vec::new(),
        }
    }

    /// Read-only view handed to the decision engine.
    pub fn scene<'a>(&'a self, hostiles: &'a [TrackedHostile]) -> Scene<'a> {
        Scene {
            player: &self.player,
            hostiles,
            fuels: &self.fuels,
            lanes: &self.lanes,
        }
    }
}

/// What the decision engine sees. Nothing in it can be mutated through
/// this view.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub player: &'a PlayerState,
    pub hostiles: &'a [TrackedHostile],
    pub fuels: &'a [Entity],
    pub lanes: &'a [LaneSegment],
}
