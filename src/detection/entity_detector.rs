// src/detection/entity_detector.rs
//
// Stateless per-frame classification of hostiles and fuel pickups.
//
// For every profile in scan order: threshold the HSV frame, extract external
// contours and keep those whose area clears the noise floor and falls in the
// profile's area range. No history and no cross-kind disambiguation.

use super::profiles::ProfileTable;
use crate::color_analysis::{external_blobs, HsvImage};
use crate::types::{Entity, EntityKind, Point};
use anyhow::Result;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detections {
    pub hostiles: Vec<Entity>,
    pub fuels: Vec<Entity>,
}

pub struct EntityDetector<'a> {
    profiles: &'a ProfileTable,
}

impl<'a> EntityDetector<'a> {
    pub fn new(profiles: &'a ProfileTable) -> Self {
        Self { profiles }
    }

    pub fn detect(&self, hsv: &HsvImage) -> Result<Detections> {
        let mut detections = Detections::default();

        for (kind, profile) in self.profiles.scan_order() {
            let mask = hsv.in_range(&profile.color)?;

            for blob in external_blobs(&mask)? {
                let area = blob.area;
                if area <= self.profiles.noise_floor_area {
                    continue;
                }
                if !profile.accepts(area, blob.bbox.width) {
                    continue;
                }

                let c = blob.center();
                let entity = Entity::new(
                    kind,
                    Point::new(c.x + profile.center_offset_x, c.y),
                    profile.entity_width,
                );

                debug!(
                    "🎯 {} at ({}, {}) area={:.1}",
                    kind.as_str(),
                    entity.x(),
                    entity.y(),
                    area
                );

                if kind == EntityKind::Fuel {
                    detections.fuels.push(entity);
                } else {
                    detections.hostiles.push(entity);
                }
            }
        }

        Ok(detections)
    }
}
