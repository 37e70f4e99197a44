// src/detection/lane_segmenter.rs
//
// Navigable river intervals on one fixed scan row.
//
// Banks (green) and islands/roads (gray) are merged into a single obstacle
// mask, closed with a square kernel so anti-aliased edges and small specks do
// not split a channel, and then the scan row is read left to right. Every
// maximal run of free pixels becomes a LaneSegment.

use crate::color_analysis::{close_rect, union_masks, HsvImage, HsvRange};
use crate::types::LaneSegment;
use anyhow::{bail, Result};
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    pub obstacle_colors: Vec<HsvRange>,
    /// Absolute row (inside the ROI) that is scanned.
    pub scan_row: usize,
    /// Side of the square closing kernel.
    pub close_kernel: usize,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            obstacle_colors: vec![
                // Green banks
                HsvRange::new([35, 40, 40], [85, 255, 255]),
                // Gray terrain
                HsvRange::new([0, 0, 50], [180, 50, 200]),
            ],
            scan_row: 270,
            close_kernel: 20,
        }
    }
}

pub struct LaneSegmenter<'a> {
    config: &'a LaneConfig,
}

impl<'a> LaneSegmenter<'a> {
    pub fn new(config: &'a LaneConfig) -> Self {
        Self { config }
    }

    /// Segments ordered by x. Fails when the scan row is outside the frame.
    pub fn segment(&self, hsv: &HsvImage) -> Result<Vec<LaneSegment>> {
        let row = self.config.scan_row;
        if row >= hsv.height {
            bail!(
                "lane scan row {} is outside a frame of height {}",
                row,
                hsv.height
            );
        }

        // Closing at `row` only depends on rows within two kernel spans.
        let reach = 2 * self.config.close_kernel;
        let top = row.saturating_sub(reach);
        let bottom = (row + reach + 1).min(hsv.height);

        let masks = self
            .config
            .obstacle_colors
            .iter()
            .map(|range| hsv.in_range_rows(range, top, bottom))
            .collect::<Result<Vec<_>>>()?;

        let segments = match union_masks(masks)? {
            Some(obstacles) => {
                let closed = close_rect(&obstacles, self.config.close_kernel)?;
                scan_free_runs(closed.at_row::<u8>((row - top) as i32)?, row as i32)
            }
            // Nothing counts as an obstacle: the whole row is one lane.
            None => vec![LaneSegment::new(0, hsv.width as i32 - 1, row as i32)],
        };

        debug!("🌊 {} lane segment(s) on row {}", segments.len(), row);
        Ok(segments)
    }
}

/// Maximal runs of zero pixels. A run still open at the end of the row is
/// closed at the last index.
pub fn scan_free_runs(row: &[u8], y: i32) -> Vec<LaneSegment> {
    let mut segments = Vec::new();
    let mut start: Option<usize> = None;

    for (x, &v) in row.iter().enumerate() {
        if v == 0 {
            start.get_or_insert(x);
        } else if let Some(s) = start.take() {
            segments.push(LaneSegment::new(s as i32, x as i32 - 1, y));
        }
    }

    if let Some(s) = start {
        segments.push(LaneSegment::new(s as i32, row.len() as i32 - 1, y));
    }

    segments
}
