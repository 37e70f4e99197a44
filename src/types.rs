// src/types.rs

use crate::analysis::identity_tracker::TrackingConfig;
use crate::analysis::trajectory_predictor::TrajectoryConfig;
use crate::controls::ControlsConfig;
use crate::decision_engine::DecisionConfig;
use crate::detection::lane_segmenter::LaneConfig;
use crate::detection::player_locator::ProbeConfig;
use crate::detection::profiles::ProfileTable;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub frame: FrameConfig,
    pub profiles: ProfileTable,
    pub player: ProbeConfig,
    pub lanes: LaneConfig,
    pub tracking: TrackingConfig,
    pub trajectory: TrajectoryConfig,
    pub decision: DecisionConfig,
    pub controls: ControlsConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

/// Region of interest inside the captured frame. Rows outside
/// `[roi_top, roi_bottom)` (score bar, fuel gauge) are never analysed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub roi_top: usize,
    pub roi_bottom: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            roi_top: 0,
            roi_bottom: 480,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub input_dir: String,
    pub frame_width: usize,
    pub frame_height: usize,
    pub target_fps: u32,
    pub output_path: Option<String>,
    pub save_annotated: bool,
    pub annotated_dir: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_dir: "frames".to_string(),
            frame_width: 456,
            frame_height: 596,
            target_fps: 60,
            output_path: None,
            save_annotated: false,
            annotated_dir: "annotated".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "river_raid_agent=info".to_string(),
        }
    }
}

// ============================================================================
// FRAME
// ============================================================================

/// Packed 8-bit RGB frame, row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: usize, height: usize, timestamp_ms: f64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
        }
    }

    /// Uniformly filled frame, mostly useful for building synthetic scenes.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height, 0.0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("empty frame ({}x{})", self.width, self.height);
        }
        let expected = self.width * self.height * 3;
        if self.data.len() != expected {
            bail!(
                "malformed frame: {} bytes for {}x{} RGB (expected {})",
                self.data.len(),
                self.width,
                self.height,
                expected
            );
        }
        Ok(())
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, rgb: [u8; 3]) {
        for yy in y..(y + h).min(self.height) {
            for xx in x..(x + w).min(self.width) {
                let idx = (yy * self.width + xx) * 3;
                self.data[idx..idx + 3].copy_from_slice(&rgb);
            }
        }
    }

    /// Copy of rows `[top, bottom)`. Fails when the band does not fit.
    pub fn crop_rows(&self, top: usize, bottom: usize) -> Result<Frame> {
        let bottom = bottom.min(self.height);
        if top >= bottom {
            bail!(
                "ROI rows {}..{} are outside a frame of height {}",
                top,
                bottom,
                self.height
            );
        }
        let row_bytes = self.width * 3;
        let data = self.data[top * row_bytes..bottom * row_bytes].to_vec();
        Ok(Frame::new(data, self.width, bottom - top, self.timestamp_ms))
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Helicopter,
    Boat,
    Plane,
    Bridge,
    Fuel,
    Lane,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "PLAYER",
            Self::Helicopter => "HELICOPTER",
            Self::Boat => "BOAT",
            Self::Plane => "PLANE",
            Self::Bridge => "BRIDGE",
            Self::Fuel => "FUEL",
            Self::Lane => "LANE",
        }
    }

    pub fn is_hostile(&self) -> bool {
        matches!(
            self,
            Self::Helicopter | Self::Boat | Self::Plane | Self::Bridge
        )
    }

    /// Aerial targets whose ground intercept is predicted ahead of time.
    pub fn is_predictive(&self) -> bool {
        matches!(self, Self::Plane)
    }

    /// Wide static obstacles that are shot on overlap rather than on aim.
    pub fn is_wide_obstacle(&self) -> bool {
        matches!(self, Self::Bridge)
    }

    /// Planes cross the screen too fast to chase or sidestep.
    pub fn allows_lateral_moves(&self) -> bool {
        !matches!(self, Self::Plane)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Shared geometry of every detected thing. `left`/`right` are derived from
/// the centre and only change through [`Entity::set_position`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    kind: EntityKind,
    center: Point,
    width: i32,
    left: i32,
    right: i32,
    present: bool,
}

impl Entity {
    pub fn new(kind: EntityKind, center: Point, width: i32) -> Self {
        let half = width / 2;
        Self {
            kind,
            center,
            width,
            left: center.x - half,
            right: center.x + half,
            present: true,
        }
    }

    /// Placeholder for an entity that was not found this frame.
    pub fn absent(kind: EntityKind, width: i32) -> Self {
        Self {
            present: false,
            ..Self::new(kind, Point::new(0, 0), width)
        }
    }

    pub fn set_position(&mut self, center: Point) {
        let half = self.width / 2;
        self.center = center;
        self.left = center.x - half;
        self.right = center.x + half;
    }

    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }
    pub fn center(&self) -> Point {
        self.center
    }
    pub fn x(&self) -> i32 {
        self.center.x
    }
    pub fn y(&self) -> i32 {
        self.center.y
    }
    pub fn width(&self) -> i32 {
        self.width
    }
    pub fn left(&self) -> i32 {
        self.left
    }
    pub fn right(&self) -> i32 {
        self.right
    }
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Horizontal intervals overlap once this entity is widened by `margin`
    /// and `other` is narrowed by `tolerance` on both sides.
    pub fn is_aligned(&self, other: &Entity, margin: i32, tolerance: i32) -> bool {
        let self_left = self.left - margin;
        let self_right = self.right + margin;
        let other_left = other.left + tolerance;
        let other_right = other.right - tolerance;
        other_left <= self_right && other_right >= self_left
    }

    /// Our centre lies within `tolerance` of the other entity's centre.
    pub fn is_aiming(&self, other: &Entity, tolerance: i32) -> bool {
        (self.center.x - other.center.x).abs() <= tolerance
    }

    /// Positive when `other` is to the right.
    pub fn x_diff(&self, other: &Entity) -> i32 {
        other.center.x - self.center.x
    }

    /// Positive when `other` is above (further up the screen).
    pub fn y_diff(&self, other: &Entity) -> i32 {
        self.center.y - other.center.y
    }
}

/// Contiguous navigable interval `[start, end]` on the lane scan row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaneSegment {
    pub start: i32,
    pub end: i32,
    pub row: i32,
}

impl LaneSegment {
    pub fn new(start: i32, end: i32, row: i32) -> Self {
        Self { start, end, row }
    }

    pub fn center_x(&self) -> i32 {
        (self.start + self.end) / 2
    }

    pub fn span(&self) -> i32 {
        self.end - self.start
    }

    pub fn as_entity(&self) -> Entity {
        Entity::new(
            EntityKind::Lane,
            Point::new(self.center_x(), self.row),
            self.span(),
        )
    }

    /// The entity's whole horizontal extent fits inside the segment.
    pub fn includes(&self, entity: &Entity) -> bool {
        let lane = self.as_entity();
        lane.left() <= entity.left() && lane.right() >= entity.right()
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandToken {
    Fire,
    Up,
    Down,
    Left,
    Right,
    Start,
    Select,
    Action,
}

/// Held buttons stay pressed until the sink's release window lapses;
/// pulsed buttons are released on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressMode {
    Hold,
    Pulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub token: CommandToken,
    pub mode: PressMode,
}

impl Command {
    pub fn hold(token: CommandToken) -> Self {
        Self {
            token,
            mode: PressMode::Hold,
        }
    }

    pub fn pulse(token: CommandToken) -> Self {
        Self {
            token,
            mode: PressMode::Pulse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn token(&self) -> CommandToken {
        match self {
            Direction::Left => CommandToken::Left,
            Direction::Right => CommandToken::Right,
        }
    }
}
