// src/detection/profiles.rs
//
// Per-kind colour/area signatures. These are static configuration: they
// decide which contours become which entity but never appear in runtime
// entity state.

use crate::color_analysis::HsvRange;
use crate::types::EntityKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaRange {
    pub min: f64,
    pub max: f64,
}

impl AreaRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, area: f64) -> bool {
        self.min <= area && area <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidthRange {
    pub min: i32,
    pub max: i32,
}

impl WidthRange {
    pub fn contains(&self, width: i32) -> bool {
        self.min <= width && width <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionProfile {
    pub color: HsvRange,
    pub area: AreaRange,
    /// Bounding-box width filter; only the player needs one.
    #[serde(default)]
    pub width: Option<WidthRange>,
    /// Nominal width given to entities of this kind.
    pub entity_width: i32,
    /// Horizontal correction applied to the bounding-box centre.
    #[serde(default)]
    pub center_offset_x: i32,
}

impl DetectionProfile {
    pub fn accepts(&self, area: f64, bbox_width: i32) -> bool {
        self.area.contains(area) && self.width.map_or(true, |w| w.contains(bbox_width))
    }

    pub fn is_valid(&self) -> bool {
        self.color.is_valid()
            && self.area.min <= self.area.max
            && self.width.map_or(true, |w| w.min <= w.max)
            && self.entity_width >= 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileTable {
    pub player: DetectionProfile,
    pub helicopter: DetectionProfile,
    pub plane: DetectionProfile,
    pub boat: DetectionProfile,
    pub fuel: DetectionProfile,
    pub bridge: DetectionProfile,
    /// Contours at or below this area are noise regardless of profile.
    pub noise_floor_area: f64,
}

impl ProfileTable {
    /// Non-player profiles in detection order. A region matching several
    /// profiles is reported once per matching kind.
    pub fn scan_order(&self) -> [(EntityKind, &DetectionProfile); 5] {
        [
            (EntityKind::Helicopter, &self.helicopter),
            (EntityKind::Plane, &self.plane),
            (EntityKind::Boat, &self.boat),
            (EntityKind::Fuel, &self.fuel),
            (EntityKind::Bridge, &self.bridge),
        ]
    }

    pub fn get(&self, kind: EntityKind) -> Option<&DetectionProfile> {
        match kind {
            EntityKind::Player => Some(&self.player),
            EntityKind::Helicopter => Some(&self.helicopter),
            EntityKind::Plane => Some(&self.plane),
            EntityKind::Boat => Some(&self.boat),
            EntityKind::Fuel => Some(&self.fuel),
            EntityKind::Bridge => Some(&self.bridge),
            EntityKind::Lane => None,
        }
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            // Yellow jet
            player: DetectionProfile {
                color: HsvRange::new([20, 100, 100], [30, 255, 255]),
                area: AreaRange::new(200.0, 400.0),
                width: Some(WidthRange { min: 15, max: 25 }),
                entity_width: 20,
                center_offset_x: 0,
            },
            // Dark green
            helicopter: DetectionProfile {
                color: HsvRange::new([50, 100, 50], [90, 255, 255]),
                area: AreaRange::new(50.0, 53.0),
                width: None,
                entity_width: 30,
                center_offset_x: -2,
            },
            // Light blue
            plane: DetectionProfile {
                color: HsvRange::new([100, 50, 100], [140, 150, 255]),
                area: AreaRange::new(120.0, 130.0),
                width: None,
                entity_width: 25,
                center_offset_x: 0,
            },
            // Dark red
            boat: DetectionProfile {
                color: HsvRange::new([0, 180, 150], [10, 255, 255]),
                area: AreaRange::new(200.0, 250.0),
                width: None,
                entity_width: 50,
                center_offset_x: 0,
            },
            // Light red
            fuel: DetectionProfile {
                color: HsvRange::new([0, 100, 100], [5, 255, 255]),
                area: AreaRange::new(229.0, 229.0),
                width: None,
                entity_width: 20,
                center_offset_x: 0,
            },
            // Orange deck
            bridge: DetectionProfile {
                color: HsvRange::new([10, 120, 80], [20, 255, 220]),
                area: AreaRange::new(1500.0, 12000.0),
                width: None,
                entity_width: 120,
                center_offset_x: 0,
            },
            noise_floor_area: 30.0,
        }
    }
}
