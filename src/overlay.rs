// src/overlay.rs
//
// Diagnostic drawing of a Scene on top of the frame it came from. Nothing in
// the decision path depends on it.

use crate::pipeline::frame_context::Scene;
use crate::types::{Config, Entity, EntityKind, Frame};
use anyhow::Result;
use opencv::{core, imgcodecs, imgproc, prelude::*};
use std::path::Path;

fn kind_color(kind: EntityKind) -> core::Scalar {
    // BGR
    match kind {
        EntityKind::Player => core::Scalar::new(0.0, 255.0, 255.0, 0.0),
        EntityKind::Helicopter => core::Scalar::new(0.0, 200.0, 0.0, 0.0),
        EntityKind::Boat => core::Scalar::new(0.0, 0.0, 200.0, 0.0),
        EntityKind::Plane => core::Scalar::new(255.0, 200.0, 100.0, 0.0),
        EntityKind::Bridge => core::Scalar::new(0.0, 140.0, 255.0, 0.0),
        EntityKind::Fuel => core::Scalar::new(255.0, 0.0, 255.0, 0.0),
        EntityKind::Lane => core::Scalar::new(255.0, 255.0, 0.0, 0.0),
    }
}

fn draw_entity(output: &mut Mat, entity: &Entity, label: &str) -> Result<()> {
    let color = kind_color(entity.kind());
    let y = entity.y();
    imgproc::line(
        output,
        core::Point::new(entity.left(), y),
        core::Point::new(entity.right(), y),
        color,
        2,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::circle(
        output,
        core::Point::new(entity.x(), y),
        2,
        core::Scalar::new(0.0, 255.0, 0.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::put_text(
        output,
        label,
        core::Point::new(entity.x(), y - 4),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.4,
        core::Scalar::new(255.0, 255.0, 255.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

/// Render `scene` over the ROI of `frame` as a BGR Mat.
pub fn draw_scene(frame: &Frame, scene: &Scene, config: &Config) -> Result<Mat> {
    let roi = frame.crop_rows(config.frame.roi_top, config.frame.roi_bottom)?;
    let mat = Mat::from_slice(&roi.data)?;
    let mat = mat.reshape(3, roi.height as i32)?;

    let mut output = Mat::default();
    imgproc::cvt_color_def(&mat, &mut output, imgproc::COLOR_RGB2BGR)?;

    for lane in scene.lanes {
        imgproc::line(
            &mut output,
            core::Point::new(lane.start, lane.row),
            core::Point::new(lane.end, lane.row),
            kind_color(EntityKind::Lane),
            1,
            imgproc::LINE_8,
            0,
        )?;
    }

    for fuel in scene.fuels {
        draw_entity(&mut output, fuel, EntityKind::Fuel.as_str())?;
    }

    let reference_y = config.trajectory.reference_line_y as i32;
    for hostile in scene.hostiles {
        let label = format!("{} #{}", hostile.entity().kind().as_str(), hostile.id());
        draw_entity(&mut output, hostile.entity(), &label)?;

        if let Some(x) = hostile.predicted_intercept_x() {
            imgproc::draw_marker(
                &mut output,
                core::Point::new(x as i32, reference_y),
                kind_color(EntityKind::Plane),
                imgproc::MARKER_CROSS,
                10,
                2,
                imgproc::LINE_8,
            )?;
        }
    }

    let player = scene.player;
    if player.is_present() {
        draw_entity(&mut output, &player.entity, EntityKind::Player.as_str())?;

        // Probe columns, cyan when open, red when blocked.
        let probes = &config.player;
        let offset = player.entity.width() / 2 + probes.probe_margin;
        let upper = player.entity.y() - probes.probe_rise;
        for (x, open) in [
            (player.entity.x() - offset, player.can_move_left),
            (player.entity.x() + offset, player.can_move_right),
        ] {
            let color = if open {
                core::Scalar::new(255.0, 255.0, 0.0, 0.0)
            } else {
                core::Scalar::new(0.0, 0.0, 255.0, 0.0)
            };
            for y in [upper, upper + probes.probe_span] {
                imgproc::circle(
                    &mut output,
                    core::Point::new(x, y),
                    3,
                    color,
                    -1,
                    imgproc::LINE_8,
                    0,
                )?;
            }
        }
    }

    Ok(output)
}

pub fn save_png(mat: &Mat, path: &Path) -> Result<()> {
    let path = path.to_string_lossy();
    if !imgcodecs::imwrite_def(&path, mat)? {
        anyhow::bail!("failed to write {}", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineOrchestrator;
    use std::time::Duration;

    #[test]
    fn test_draws_over_region_of_interest() {
        let config = Config::default();
        let mut frame = Frame::filled(456, 596, [0, 0, 255]);
        // Player: centre (200, 428), nominal width 20
        frame.fill_rect(190, 420, 21, 16, [255, 255, 0]);

        let mut pipeline = PipelineOrchestrator::new(config.clone());
        pipeline.process_frame(&frame, Duration::ZERO).unwrap();
        let scene = pipeline.scene().unwrap();

        let mat = draw_scene(&frame, &scene, &config).unwrap();
        assert_eq!(mat.rows(), 480);
        assert_eq!(mat.cols(), 456);
        assert_eq!(mat.channels(), 3);

        // Left end of the player's interval, in the player's BGR colour.
        let px = mat.at_2d::<core::Vec3b>(428, 190).unwrap();
        assert_eq!(px.0, [0, 255, 255]);
    }
}
