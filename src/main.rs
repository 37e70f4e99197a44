// src/main.rs
//
// Replay driver: feeds recorded frame dumps through the pipeline as if they
// were arriving live, drives a button mask with the resulting commands and
// writes one JSON report per frame.

use anyhow::{Context, Result};
use river_raid_agent::controls::{ButtonMask, CommandSink};
use river_raid_agent::frame_source::FrameSource;
use river_raid_agent::overlay::{draw_scene, save_png};
use river_raid_agent::pipeline::{FrameReport, PipelineOrchestrator};
use river_raid_agent::types::{Config, Frame};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "RIVER_RAID_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// One output line: the pipeline's report plus the resulting button mask.
#[derive(Serialize)]
struct ReplayLine<'a> {
    source: String,
    #[serde(flatten)]
    report: &'a FrameReport,
    buttons: [u8; river_raid_agent::controls::BUTTON_COUNT],
}

fn main() -> Result<()> {
    let config_path =
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    // Only a missing file falls back to defaults; a broken one is fatal.
    let loaded = Config::load_optional(&config_path)?;
    let from_file = loaded.is_some();
    let config = loaded.unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    info!("🛩️ River Raid agent starting");
    if from_file {
        info!("✓ Configuration loaded from {}", config_path);
    } else {
        warn!("⚠️ {} not found, using built-in defaults", config_path);
    }

    let mut source = FrameSource::discover(&config.replay)?;
    if source.is_empty() {
        error!("No frame dumps found in {}", config.replay.input_dir);
        return Ok(());
    }

    let mut out: Box<dyn Write> = match &config.replay.output_path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut buttons = ButtonMask::new(config.controls.clone());
    let mut pipeline = PipelineOrchestrator::new(config.clone());
    let mut index = 0usize;

    while let Some((frame, path)) = source.read_frame()? {
        let elapsed = source.elapsed_for(index);
        let now_ms = elapsed.as_secs_f64() * 1000.0;
        index += 1;

        buttons.tick(now_ms);

        let report = match pipeline.process_frame(&frame, elapsed) {
            Ok(report) => report,
            Err(e) => {
                error!("Skipping {}: {:#}", path.display(), e);
                continue;
            }
        };

        buttons.submit(&report.commands, now_ms);

        if config.replay.save_annotated {
            save_annotated(&pipeline, &frame, &path)?;
        }

        let line = ReplayLine {
            source: path.display().to_string(),
            report: &report,
            buttons: buttons.buttons(),
        };
        serde_json::to_writer(&mut out, &line)?;
        out.write_all(b"\n")?;

        if index % 600 == 0 {
            debug!("Progress: {:.1}%", source.progress());
        }
    }
    out.flush()?;

    let summary = pipeline.metrics().summary();
    info!("\n========================================");
    info!("✓ Replay finished");
    info!(
        "  Frames: {} processed, {} rejected",
        summary.total_frames, summary.rejected_frames
    );
    info!(
        "  Player visible: {} ({:.1}%)",
        summary.frames_with_player,
        100.0 * summary.frames_with_player as f64 / summary.total_frames.max(1) as f64
    );
    info!(
        "  🎯 Detections: {} helicopters, {} boats, {} planes, {} bridges, {} fuel",
        summary.helicopters, summary.boats, summary.planes, summary.bridges, summary.fuels
    );
    info!(
        "  🎮 Commands: {} fire, {} dodge, {} move",
        summary.fires, summary.dodges, summary.moves
    );
    info!(
        "  ⏱️ Frame time: last {} µs, peak {} µs ({:.1} FPS)",
        summary.last_frame_us, summary.peak_frame_us, summary.fps
    );
    info!("========================================");

    Ok(())
}

fn save_annotated(pipeline: &PipelineOrchestrator, frame: &Frame, path: &Path) -> Result<()> {
    let Some(scene) = pipeline.scene() else {
        return Ok(());
    };
    let config = pipeline.config();
    let dir = Path::new(&config.replay.annotated_dir);
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let annotated = draw_scene(frame, &scene, config)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    save_png(&annotated, &dir.join(format!("{}.png", name)))
}
