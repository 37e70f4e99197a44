// src/analysis/identity_tracker.rs
//
// Frame-to-frame identity for hostiles.
//
// The detector is stateless, so a helicopter seen in two consecutive frames
// arrives as two unrelated entities. The tracker links them by proximity:
// a fresh detection is "the same" hostile as a previous one when the kinds
// match and both |dx| and |dy| are under fixed tolerances.
//
// Matching is greedy. Detections are visited in detector order and each
// takes the first unclaimed previous track that qualifies; a previous track
// is claimed at most once. Objects per frame are few and move a handful of
// pixels per tick, so this is enough in practice.
//
// Only hostiles are carried forward. Unmatched previous tracks are dropped
// immediately; there is no coasting.

use super::trajectory_predictor::KalmanTrack;
use crate::types::{Entity, Point};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Max horizontal displacement (px) between frames for the same hostile
    pub x_tolerance: i32,
    /// Max vertical displacement (px) between frames for the same hostile
    pub y_tolerance: i32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            x_tolerance: 30,
            y_tolerance: 20,
        }
    }
}

// ============================================================================
// TRACKED HOSTILE
// ============================================================================

/// A hostile whose identity persists across frames. Predictive kinds also
/// carry a Kalman track (created by the predictor on first update) and the
/// last predicted intercept.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedHostile {
    id: u32,
    entity: Entity,
    kalman: Option<KalmanTrack>,
    predicted_intercept_x: Option<f32>,
    age: u32,
}

impl TrackedHostile {
    fn spawn(id: u32, entity: Entity) -> Self {
        Self {
            id,
            entity,
            kalman: None,
            predicted_intercept_x: None,
            age: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Frames this hostile has been re-identified since it was first seen.
    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn predicted_intercept_x(&self) -> Option<f32> {
        self.predicted_intercept_x
    }

    pub fn kalman(&self) -> Option<&KalmanTrack> {
        self.kalman.as_ref()
    }

    pub(crate) fn kalman_slot(&mut self) -> &mut Option<KalmanTrack> {
        &mut self.kalman
    }

    pub(crate) fn set_predicted_intercept(&mut self, x: Option<f32>) {
        self.predicted_intercept_x = x;
    }

    fn matches(&self, detection: &Entity, config: &TrackingConfig) -> bool {
        self.entity.kind() == detection.kind()
            && (self.entity.x() - detection.x()).abs() < config.x_tolerance
            && (self.entity.y() - detection.y()).abs() < config.y_tolerance
    }

    fn relocate(&mut self, center: Point) {
        self.entity.set_position(center);
        self.age += 1;
    }
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct IdentityTracker {
    config: TrackingConfig,
    tracks: Vec<TrackedHostile>,
    next_id: u32,
}

impl IdentityTracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    /// Replace the carried set with this frame's hostiles, reusing previous
    /// tracks where a detection is close enough to one.
    pub fn reconcile(&mut self, detections: Vec<Entity>) -> &mut [TrackedHostile] {
        let mut previous: Vec<Option<TrackedHostile>> =
            std::mem::take(&mut self.tracks).into_iter().map(Some).collect();
        let mut merged = Vec::with_capacity(detections.len());
        let mut reused = 0usize;

        for detection in detections {
            let slot = previous
                .iter_mut()
                .find(|p| p.as_ref().is_some_and(|t| t.matches(&detection, &self.config)));

            match slot.and_then(Option::take) {
                Some(mut track) => {
                    track.relocate(detection.center());
                    reused += 1;
                    merged.push(track);
                }
                None => {
                    let track = TrackedHostile::spawn(self.next_id, detection);
                    self.next_id = self.next_id.wrapping_add(1);
                    merged.push(track);
                }
            }
        }

        let dropped = previous.iter().filter(|p| p.is_some()).count();
        debug!(
            "🎯 hostiles: {} tracked ({} reused, {} new, {} dropped)",
            merged.len(),
            reused,
            merged.len() - reused,
            dropped
        );

        self.tracks = merged;
        &mut self.tracks
    }

    pub fn tracks(&self) -> &[TrackedHostile] {
        &self.tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKind;

    fn heli(x: i32, y: i32) -> Entity {
        Entity::new(EntityKind::Helicopter, Point::new(x, y), 30)
    }

    fn plane(x: i32, y: i32) -> Entity {
        Entity::new(EntityKind::Plane, Point::new(x, y), 30)
    }

    #[test]
    fn test_small_motion_reuses_track() {
        let mut tracker = IdentityTracker::new(TrackingConfig::default());
        tracker.reconcile(vec![heli(100, 200)]);
        let id = tracker.tracks()[0].id();

        let tracks = tracker.reconcile(vec![heli(102, 198)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id(), id);
        assert_eq!(tracks[0].age(), 1);
        assert_eq!(tracks[0].entity().center(), Point::new(102, 198));
        assert_eq!(tracks[0].entity().left(), 102 - 15);
    }

    #[test]
    fn test_far_detection_replaces_track() {
        let mut tracker = IdentityTracker::new(TrackingConfig::default());
        tracker.reconcile(vec![heli(0, 0)]);
        let old_id = tracker.tracks()[0].id();

        let tracks = tracker.reconcile(vec![heli(500, 500)]);
        assert_eq!(tracks.len(), 1);
        assert_ne!(tracks[0].id(), old_id);
        assert_eq!(tracks[0].age(), 0);
        assert_eq!(tracks[0].entity().center(), Point::new(500, 500));
    }

    #[test]
    fn test_kind_must_match() {
        let mut tracker = IdentityTracker::new(TrackingConfig::default());
        tracker.reconcile(vec![heli(100, 100)]);
        let old_id = tracker.tracks()[0].id();
        let boat = Entity::new(EntityKind::Boat, Point::new(101, 101), 50);
        let tracks = tracker.reconcile(vec![boat]);
        assert_ne!(tracks[0].id(), old_id);
    }

    #[test]
    fn test_tolerance_is_strict() {
        let mut tracker = IdentityTracker::new(TrackingConfig::default());
        tracker.reconcile(vec![heli(100, 100)]);
        let old_id = tracker.tracks()[0].id();
        let tracks = tracker.reconcile(vec![heli(130, 100)]);
        assert_ne!(tracks[0].id(), old_id);
    }

    #[test]
    fn test_previous_track_claimed_once() {
        let mut tracker = IdentityTracker::new(TrackingConfig::default());
        tracker.reconcile(vec![heli(100, 100)]);
        let old_id = tracker.tracks()[0].id();

        let tracks = tracker.reconcile(vec![heli(105, 100), heli(110, 100)]);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id(), old_id);
        assert_ne!(tracks[1].id(), old_id);
    }

    #[test]
    fn test_first_previous_match_wins() {
        let mut tracker = IdentityTracker::new(TrackingConfig::default());
        tracker.reconcile(vec![heli(100, 100), heli(110, 100)]);
        let first = tracker.tracks()[0].id();
        // Closer to the second track, but the first one still qualifies.
        let tracks = tracker.reconcile(vec![heli(109, 100)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id(), first);
    }

    #[test]
    fn test_new_tracks_start_without_prediction() {
        let mut tracker = IdentityTracker::new(TrackingConfig::default());
        let tracks = tracker.reconcile(vec![plane(200, 50)]);
        assert!(tracks[0].kalman().is_none());
        assert_eq!(tracks[0].predicted_intercept_x(), None);
    }

    #[test]
    fn test_empty_frame_drops_everything() {
        let mut tracker = IdentityTracker::new(TrackingConfig::default());
        tracker.reconcile(vec![heli(10, 10), plane(200, 50)]);
        assert!(tracker.reconcile(Vec::new()).is_empty());
        assert!(tracker.tracks().is_empty());
    }
}
