// src/detection/player_locator.rs
//
// Finds the player's jet and decides whether it can slide left or right.
//
// Unlike EntityDetector this is a best-match search: of all contours that
// pass the player's area/width filter, the one whose area is closest to the
// middle of the area range wins. Lateral freedom is read from two probe
// columns beside the jet; a side is open only when both probe rows on that
// side show open water, so a single stray pixel cannot unblock a wall.

use super::profiles::DetectionProfile;
use crate::color_analysis::{external_blobs, HsvImage, HsvRange};
use crate::types::{Entity, EntityKind, Point};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// River colour; probes landing on it mean the jet may move that way.
    pub open_water: HsvRange,
    /// Gap between the jet's edge and the probe column.
    pub probe_margin: i32,
    /// How far above the jet's centre the upper probe sits.
    pub probe_rise: i32,
    /// Vertical distance between the two probes on each side.
    pub probe_span: i32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            open_water: HsvRange::new([100, 100, 100], [140, 255, 255]),
            probe_margin: 18,
            probe_rise: 18,
            probe_span: 30,
        }
    }
}

/// The player plus its lateral movement feasibility. When the jet is not
/// found both directions stay allowed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    pub entity: Entity,
    pub can_move_left: bool,
    pub can_move_right: bool,
}

impl PlayerState {
    pub fn missing(width: i32) -> Self {
        Self {
            entity: Entity::absent(EntityKind::Player, width),
            can_move_left: true,
            can_move_right: true,
        }
    }

    pub fn is_present(&self) -> bool {
        self.entity.is_present()
    }
}

pub struct PlayerLocator<'a> {
    profile: &'a DetectionProfile,
    probes: &'a ProbeConfig,
}

impl<'a> PlayerLocator<'a> {
    pub fn new(profile: &'a DetectionProfile, probes: &'a ProbeConfig) -> Self {
        Self { profile, probes }
    }

    pub fn locate(&self, hsv: &HsvImage) -> Result<PlayerState> {
        let mask = hsv.in_range(&self.profile.color)?;
        let target = self.profile.area.midpoint();

        let best = external_blobs(&mask)?
            .into_iter()
            .filter(|b| self.profile.accepts(b.area, b.bbox.width))
            .map(|b| ((b.area - target).abs(), b.center()))
            // Strict comparison keeps the earliest contour on ties.
            .fold(None, |best: Option<(f64, Point)>, (diff, center)| match best {
                Some((best_diff, _)) if best_diff <= diff => best,
                _ => Some((diff, center)),
            });

        let Some((diff, center)) = best else {
            debug!("🛩️ player not found, lateral moves left open");
            return Ok(PlayerState::missing(self.profile.entity_width));
        };

        let center = Point::new(center.x + self.profile.center_offset_x, center.y);
        let entity = Entity::new(EntityKind::Player, center, self.profile.entity_width);
        let (can_move_left, can_move_right) = self.probe_sides(hsv, &entity)?;

        debug!(
            "🛩️ player at ({}, {}) area_diff={:.1} left={} right={}",
            center.x, center.y, diff, can_move_left, can_move_right
        );

        Ok(PlayerState {
            entity,
            can_move_left,
            can_move_right,
        })
    }

    fn probe_sides(&self, hsv: &HsvImage, player: &Entity) -> Result<(bool, bool)> {
        let max_x = hsv.width as i32 - 1;
        let max_y = hsv.height as i32 - 1;

        let offset = player.width() / 2 + self.probes.probe_margin;
        let left_x = (player.x() - offset).max(0);
        let right_x = (player.x() + offset).min(max_x);

        let upper = (player.y().clamp(0, max_y) - self.probes.probe_rise).clamp(0, max_y);
        let lower = (upper + self.probes.probe_span).clamp(0, max_y);

        let water = |x: i32, y: i32| -> Result<bool> {
            Ok(self.probes.open_water.contains(hsv.get(x as usize, y as usize)?))
        };
        let open = |x: i32| -> Result<bool> { Ok(water(x, upper)? && water(x, lower)?) };
        Ok((open(left_x)?, open(right_x)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::profiles::ProfileTable;
    use crate::types::Frame;

    const RIVER: [u8; 3] = [0, 0, 255];
    const YELLOW: [u8; 3] = [255, 255, 0];
    const BANK: [u8; 3] = [0, 160, 0];

    fn locate(frame: &Frame) -> PlayerState {
        let table = ProfileTable::default();
        let probes = ProbeConfig::default();
        let hsv = HsvImage::from_frame(frame).unwrap();
        PlayerLocator::new(&table.player, &probes)
            .locate(&hsv)
            .unwrap()
    }

    #[test]
    fn test_player_in_open_water() {
        let mut frame = Frame::filled(200, 200, RIVER);
        // 21x16 -> area 300, width 21
        frame.fill_rect(90, 150, 21, 16, YELLOW);
        let player = locate(&frame);
        assert!(player.is_present());
        assert_eq!(player.entity.center(), Point::new(100, 158));
        assert!(player.can_move_left);
        assert!(player.can_move_right);
    }

    #[test]
    fn test_bank_blocks_one_side() {
        let mut frame = Frame::filled(200, 200, RIVER);
        frame.fill_rect(0, 0, 75, 200, BANK);
        frame.fill_rect(90, 150, 21, 16, YELLOW);
        let player = locate(&frame);
        // Left probe column is x = 100 - 28 = 72, inside the bank.
        assert!(!player.can_move_left);
        assert!(player.can_move_right);
    }

    #[test]
    fn test_single_water_pixel_does_not_open_side() {
        let mut frame = Frame::filled(200, 200, RIVER);
        frame.fill_rect(0, 0, 75, 200, BANK);
        frame.fill_rect(90, 150, 21, 16, YELLOW);
        // Water only at the upper probe (x=72, y=140).
        frame.fill_rect(72, 140, 1, 1, RIVER);
        let player = locate(&frame);
        assert!(!player.can_move_left);
    }

    #[test]
    fn test_missing_player_fails_open() {
        let frame = Frame::filled(200, 200, RIVER);
        let player = locate(&frame);
        assert!(!player.is_present());
        assert!(player.can_move_left);
        assert!(player.can_move_right);
    }

    #[test]
    fn test_best_area_match_wins() {
        let mut frame = Frame::filled(300, 200, RIVER);
        // area 20*11 = 220, far from the 300 midpoint
        frame.fill_rect(20, 50, 21, 12, YELLOW);
        // area 20*15 = 300, exact midpoint
        frame.fill_rect(200, 150, 21, 16, YELLOW);
        let player = locate(&frame);
        assert_eq!(player.entity.center(), Point::new(210, 158));
    }

    #[test]
    fn test_wrong_width_rejected() {
        let mut frame = Frame::filled(200, 200, RIVER);
        // 31x11 -> area 300 but 31px wide
        frame.fill_rect(50, 50, 31, 11, YELLOW);
        let player = locate(&frame);
        assert!(!player.is_present());
    }
}
