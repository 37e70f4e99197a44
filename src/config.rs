// src/config.rs

use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Like [`load`](Self::load), but a file that does not exist yields
    /// `Ok(None)`. A file that exists and is unreadable or invalid is an error.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading config {}", path.display()))
            }
        };
        Self::from_yaml(&contents)
            .with_context(|| format!("parsing config {}", path.display()))
            .map(Some)
    }

    /// Parse and validate a YAML document. Missing keys take their defaults.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.profiles;
        for (name, profile) in [
            ("player", &p.player),
            ("helicopter", &p.helicopter),
            ("plane", &p.plane),
            ("boat", &p.boat),
            ("fuel", &p.fuel),
            ("bridge", &p.bridge),
        ] {
            if !profile.is_valid() {
                bail!("profiles.{} has an inverted HSV, area or width range", name);
            }
        }

        if !self.player.open_water.is_valid() {
            bail!("player.open_water is an inverted HSV range");
        }
        if self.lanes.obstacle_colors.iter().any(|r| !r.is_valid()) {
            bail!("lanes.obstacle_colors contains an inverted HSV range");
        }
        if self.lanes.close_kernel == 0 {
            bail!("lanes.close_kernel must be at least 1");
        }
        if self.frame.roi_top >= self.frame.roi_bottom {
            bail!(
                "frame.roi_top ({}) must be above frame.roi_bottom ({})",
                self.frame.roi_top,
                self.frame.roi_bottom
            );
        }
        if self.tracking.x_tolerance <= 0 || self.tracking.y_tolerance <= 0 {
            bail!("tracking tolerances must be positive");
        }
        if self.trajectory.velocity_epsilon < 0.0 || self.trajectory.wrap_width < 0.0 {
            bail!("trajectory.velocity_epsilon and wrap_width must not be negative");
        }
        let wrap = self.trajectory.wrap_width;
        if wrap > 0.0 && wrap != self.replay.frame_width as f32 {
            bail!(
                "trajectory.wrap_width ({}) must match replay.frame_width ({}) or be 0",
                wrap,
                self.replay.frame_width
            );
        }
        if self.replay.target_fps == 0 {
            bail!("replay.target_fps must be positive");
        }
        Ok(())
    }
}
