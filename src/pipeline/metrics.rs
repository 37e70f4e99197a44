// src/pipeline/metrics.rs
//
// Counters and timings for the perception-to-action loop. Cheap to clone;
// every clone shares the same counters.

use crate::types::EntityKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub rejected_frames: Arc<AtomicU64>,
    pub frames_with_player: Arc<AtomicU64>,
    pub helicopters: Arc<AtomicU64>,
    pub boats: Arc<AtomicU64>,
    pub planes: Arc<AtomicU64>,
    pub bridges: Arc<AtomicU64>,
    pub fuels: Arc<AtomicU64>,
    pub fires: Arc<AtomicU64>,
    pub dodges: Arc<AtomicU64>,
    pub moves: Arc<AtomicU64>,
    pub frame_time_us: Arc<AtomicU64>,
    pub peak_frame_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            rejected_frames: Arc::new(AtomicU64::new(0)),
            frames_with_player: Arc::new(AtomicU64::new(0)),
            helicopters: Arc::new(AtomicU64::new(0)),
            boats: Arc::new(AtomicU64::new(0)),
            planes: Arc::new(AtomicU64::new(0)),
            bridges: Arc::new(AtomicU64::new(0)),
            fuels: Arc::new(AtomicU64::new(0)),
            fires: Arc::new(AtomicU64::new(0)),
            dodges: Arc::new(AtomicU64::new(0)),
            moves: Arc::new(AtomicU64::new(0)),
            frame_time_us: Arc::new(AtomicU64::new(0)),
            peak_frame_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection(&self, kind: EntityKind) {
        let counter = match kind {
            EntityKind::Helicopter => &self.helicopters,
            EntityKind::Boat => &self.boats,
            EntityKind::Plane => &self.planes,
            EntityKind::Bridge => &self.bridges,
            EntityKind::Fuel => &self.fuels,
            EntityKind::Player | EntityKind::Lane => return,
        };
        self.inc(counter);
    }

    pub fn set_frame_time(&self, duration_us: u64) {
        self.frame_time_us.store(duration_us, Ordering::Relaxed);
        self.peak_frame_time_us
            .fetch_max(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            rejected_frames: self.rejected_frames.load(Ordering::Relaxed),
            frames_with_player: self.frames_with_player.load(Ordering::Relaxed),
            fps: self.fps(),
            helicopters: self.helicopters.load(Ordering::Relaxed),
            boats: self.boats.load(Ordering::Relaxed),
            planes: self.planes.load(Ordering::Relaxed),
            bridges: self.bridges.load(Ordering::Relaxed),
            fuels: self.fuels.load(Ordering::Relaxed),
            fires: self.fires.load(Ordering::Relaxed),
            dodges: self.dodges.load(Ordering::Relaxed),
            moves: self.moves.load(Ordering::Relaxed),
            last_frame_us: self.frame_time_us.load(Ordering::Relaxed),
            peak_frame_us: self.peak_frame_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub rejected_frames: u64,
    pub frames_with_player: u64,
    pub fps: f64,
    pub helicopters: u64,
    pub boats: u64,
    pub planes: u64,
    pub bridges: u64,
    pub fuels: u64,
    pub fires: u64,
    pub dodges: u64,
    pub moves: u64,
    pub last_frame_us: u64,
    pub peak_frame_us: u64,
    pub elapsed_secs: f64,
}
