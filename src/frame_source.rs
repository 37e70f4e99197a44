// src/frame_source.rs
//
// Replays raw frame dumps from disk. Each `.rgb` file holds one packed RGB
// frame of the configured dimensions; files are played back in name order
// with a simulated clock of `index / target_fps`.

use crate::types::{Frame, ReplayConfig};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use walkdir::WalkDir;

const FRAME_EXTENSION: &str = "rgb";

pub struct FrameSource {
    files: Vec<PathBuf>,
    width: usize,
    height: usize,
    fps: u32,
    current: usize,
}

impl FrameSource {
    /// Collect every frame dump under `config.input_dir`, sorted by path.
    pub fn discover(config: &ReplayConfig) -> Result<Self> {
        if config.target_fps == 0 {
            bail!("replay.target_fps must be positive");
        }

        let root = Path::new(&config.input_dir);
        if !root.is_dir() {
            bail!("frame directory {} does not exist", root.display());
        }

        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(FRAME_EXTENSION))
            })
            .collect();
        files.sort();

        info!(
            "Found {} frame dump(s) in {} ({}x{} @ {} FPS)",
            files.len(),
            root.display(),
            config.frame_width,
            config.frame_height,
            config.target_fps
        );

        Ok(Self {
            files,
            width: config.frame_width,
            height: config.frame_height,
            fps: config.target_fps,
            current: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Simulated time since boot for the frame at `index`.
    pub fn elapsed_for(&self, index: usize) -> Duration {
        Duration::from_secs_f64(index as f64 / self.fps as f64)
    }

    /// Next frame and the file it came from, or `None` when exhausted.
    /// A file of the wrong size still yields a frame; the pipeline rejects it.
    pub fn read_frame(&mut self) -> Result<Option<(Frame, PathBuf)>> {
        let Some(path) = self.files.get(self.current).cloned() else {
            return Ok(None);
        };
        let index = self.current;
        self.current += 1;

        let data = std::fs::read(&path)
            .with_context(|| format!("reading frame dump {}", path.display()))?;
        if data.len() != self.width * self.height * 3 {
            warn!(
                "⚠️ {} holds {} bytes, expected {}",
                path.display(),
                data.len(),
                self.width * self.height * 3
            );
        }

        let timestamp_ms = self.elapsed_for(index).as_secs_f64() * 1000.0;
        Ok(Some((
            Frame::new(data, self.width, self.height, timestamp_ms),
            path,
        )))
    }

    pub fn progress(&self) -> f32 {
        if self.files.is_empty() {
            return 0.0;
        }
        (self.current as f32 / self.files.len() as f32) * 100.0
    }
}
