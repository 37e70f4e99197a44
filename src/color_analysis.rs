// src/color_analysis.rs
//
// HSV conversion, colour masks and contour blobs for the fixed-palette game
// screen.
//
// Every detector in this crate works on colour signatures: a pixel belongs to
// an entity class iff its hue/saturation/value falls inside that class's
// range. The frame is converted to HSV once per tick and every detector
// thresholds the shared HsvImage.
//
// HSV uses OpenCV's 8-bit convention, the one the detection profiles were
// tuned with: H 0-180 (degrees / 2), S 0-255, V 0-255.

use crate::types::{Frame, Point};
use anyhow::{bail, Result};
use opencv::{
    core::{self, Mat, Rect, Scalar, Vector},
    imgproc,
    prelude::*,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// HSV RANGES
// ============================================================================

/// Inclusive HSV box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
    }

    pub fn is_valid(&self) -> bool {
        (0..3).all(|c| self.lower[c] <= self.upper[c])
    }

    fn bounds(&self) -> (Scalar, Scalar) {
        let s = |v: [u8; 3]| Scalar::new(v[0] as f64, v[1] as f64, v[2] as f64, 0.0);
        (s(self.lower), s(self.upper))
    }
}

// ============================================================================
// HSV IMAGE
// ============================================================================

/// Frame converted to HSV (CV_8UC3).
pub struct HsvImage {
    pub width: usize,
    pub height: usize,
    mat: Mat,
}

impl HsvImage {
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        frame.validate()?;
        let flat = Mat::from_slice(&frame.data)?;
        let rgb = flat.reshape(3, frame.height as i32)?;

        let mut mat = Mat::default();
        imgproc::cvt_color_def(&rgb, &mut mat, imgproc::COLOR_RGB2HSV)?;

        Ok(Self {
            width: frame.width,
            height: frame.height,
            mat,
        })
    }

    /// `[h, s, v]` at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Result<[u8; 3]> {
        let px = self.mat.at_2d::<core::Vec3b>(y as i32, x as i32)?;
        Ok(px.0)
    }

    /// Binary mask (CV_8UC1, 0/255) of pixels inside `range`.
    pub fn in_range(&self, range: &HsvRange) -> Result<Mat> {
        threshold(&self.mat, range)
    }

    /// Same as [`in_range`](Self::in_range) but restricted to rows
    /// `[top, bottom)`; the returned mask is only that band.
    pub fn in_range_rows(&self, range: &HsvRange, top: usize, bottom: usize) -> Result<Mat> {
        let bottom = bottom.min(self.height);
        let top = top.min(bottom);
        if top == bottom {
            bail!("empty row band [{}, {})", top, bottom);
        }
        let band = Mat::roi(
            &self.mat,
            Rect::new(0, top as i32, self.width as i32, (bottom - top) as i32),
        )?;
        threshold(&band, range)
    }
}

fn threshold(src: &impl core::ToInputArray, range: &HsvRange) -> Result<Mat> {
    let (lower, upper) = range.bounds();
    let mut mask = Mat::default();
    core::in_range(src, &lower, &upper, &mut mask)?;
    Ok(mask)
}

// ============================================================================
// MASK OPERATIONS
// ============================================================================

/// Pixel-wise OR of equally sized masks. `None` when `masks` is empty.
pub fn union_masks(masks: impl IntoIterator<Item = Mat>) -> Result<Option<Mat>> {
    let mut acc: Option<Mat> = None;
    for mask in masks {
        acc = Some(match acc {
            None => mask,
            Some(prev) => {
                let mut merged = Mat::default();
                core::bitwise_or_def(&prev, &mask, &mut merged)?;
                merged
            }
        });
    }
    Ok(acc)
}

/// Morphological closing with a `size`×`size` rectangle anchored at its
/// centre. Pixels outside the mask never influence the result.
pub fn close_rect(mask: &Mat, size: usize) -> Result<Mat> {
    if size <= 1 {
        return Ok(mask.try_clone()?);
    }
    let kernel = imgproc::get_structuring_element(
        imgproc::MORPH_RECT,
        core::Size::new(size as i32, size as i32),
        core::Point::new(-1, -1),
    )?;
    let mut closed = Mat::default();
    imgproc::morphology_ex(
        mask,
        &mut closed,
        imgproc::MORPH_CLOSE,
        &kernel,
        core::Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;
    Ok(closed)
}

// ============================================================================
// BLOBS
// ============================================================================

/// One external contour of a mask: its polygon area and bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub area: f64,
    pub bbox: Rect,
}

impl Blob {
    pub fn center(&self) -> Point {
        Point::new(
            self.bbox.x + self.bbox.width / 2,
            self.bbox.y + self.bbox.height / 2,
        )
    }
}

/// Outermost contours of `mask`. Blobs inside another blob's hole are not
/// reported.
pub fn external_blobs(mask: &Mat) -> Result<Vec<Blob>> {
    let mut contours = Vector::<Vector<core::Point>>::new();
    imgproc::find_contours(
        mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        core::Point::default(),
    )?;

    let mut blobs = Vec::with_capacity(contours.len());
    for contour in contours {
        blobs.push(Blob {
            area: imgproc::contour_area(&contour, false)?,
            bbox: imgproc::bounding_rect(&contour)?,
        });
    }
    Ok(blobs)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const RIVER: [u8; 3] = [0, 0, 255];
    const YELLOW: [u8; 3] = [255, 255, 0];
    const YELLOW_RANGE: HsvRange = HsvRange::new([20, 100, 100], [30, 255, 255]);

    fn count(mask: &Mat) -> i32 {
        core::count_non_zero(mask).unwrap()
    }

    fn is_set(mask: &Mat, x: i32, y: i32) -> bool {
        *mask.at_2d::<u8>(y, x).unwrap() != 0
    }

    #[test]
    fn test_hsv_of_primaries() {
        let mut frame = Frame::filled(4, 1, [255, 0, 0]);
        frame.fill_rect(1, 0, 1, 1, [0, 255, 0]);
        frame.fill_rect(2, 0, 1, 1, RIVER);
        frame.fill_rect(3, 0, 1, 1, YELLOW);
        let hsv = HsvImage::from_frame(&frame).unwrap();
        assert_eq!(hsv.get(0, 0).unwrap(), [0, 255, 255]);
        assert_eq!(hsv.get(1, 0).unwrap(), [60, 255, 255]);
        assert_eq!(hsv.get(2, 0).unwrap(), [120, 255, 255]);
        assert_eq!(hsv.get(3, 0).unwrap(), [30, 255, 255]);
    }

    #[test]
    fn test_gray_has_no_saturation() {
        let hsv = HsvImage::from_frame(&Frame::filled(2, 2, [128, 128, 128])).unwrap();
        let [_, s, v] = hsv.get(1, 1).unwrap();
        assert_eq!(s, 0);
        assert_eq!(v, 128);
    }

    #[test]
    fn test_malformed_frame_rejected() {
        let frame = Frame::new(vec![0; 5], 2, 2, 0.0);
        assert!(HsvImage::from_frame(&frame).is_err());
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        assert!(YELLOW_RANGE.contains([30, 255, 255]));
        assert!(YELLOW_RANGE.contains([20, 100, 100]));
        assert!(!YELLOW_RANGE.contains([31, 255, 255]));
        assert!(YELLOW_RANGE.is_valid());
        assert!(!HsvRange::new([40, 0, 0], [30, 255, 255]).is_valid());
    }

    #[test]
    fn test_mask_from_frame() {
        let mut frame = Frame::filled(10, 10, RIVER);
        frame.fill_rect(2, 3, 4, 2, YELLOW);
        let hsv = HsvImage::from_frame(&frame).unwrap();
        let mask = hsv.in_range(&YELLOW_RANGE).unwrap();
        assert_eq!(count(&mask), 8);
        assert!(is_set(&mask, 2, 3));
        assert!(!is_set(&mask, 6, 3));

        let band = hsv.in_range_rows(&YELLOW_RANGE, 4, 8).unwrap();
        assert_eq!(band.rows(), 4);
        assert_eq!(count(&band), 4);
        assert!(is_set(&band, 2, 0));
    }

    #[test]
    fn test_close_fills_small_gap_and_keeps_wide_one() {
        // Obstacles everywhere except a 3px and a 20px vertical channel.
        let mut frame = Frame::filled(60, 11, YELLOW);
        frame.fill_rect(10, 0, 3, 11, RIVER);
        frame.fill_rect(30, 0, 20, 11, RIVER);
        let mask = HsvImage::from_frame(&frame)
            .unwrap()
            .in_range(&YELLOW_RANGE)
            .unwrap();

        let closed = close_rect(&mask, 5).unwrap();
        assert!(is_set(&closed, 11, 5));
        assert!(!is_set(&closed, 40, 5));
        assert!(is_set(&closed, 29, 5));
        assert!(!is_set(&closed, 30, 5));
        assert!(!is_set(&closed, 49, 5));
        assert!(is_set(&closed, 50, 5));
    }

    #[test]
    fn test_union() {
        let mut frame = Frame::filled(3, 1, RIVER);
        frame.fill_rect(0, 0, 1, 1, YELLOW);
        frame.fill_rect(2, 0, 1, 1, [255, 0, 0]);
        let hsv = HsvImage::from_frame(&frame).unwrap();
        let masks = vec![
            hsv.in_range(&YELLOW_RANGE).unwrap(),
            hsv.in_range(&HsvRange::new([0, 100, 100], [5, 255, 255])).unwrap(),
        ];
        let merged = union_masks(masks).unwrap().unwrap();
        assert!(is_set(&merged, 0, 0));
        assert!(!is_set(&merged, 1, 0));
        assert!(is_set(&merged, 2, 0));
        assert!(union_masks(Vec::new()).unwrap().is_none());
    }

    #[test]
    fn test_rectangle_blob_area_and_box() {
        let mut frame = Frame::filled(40, 30, RIVER);
        frame.fill_rect(5, 4, 11, 6, YELLOW);
        let mask = HsvImage::from_frame(&frame)
            .unwrap()
            .in_range(&YELLOW_RANGE)
            .unwrap();
        let blobs = external_blobs(&mask).unwrap();
        assert_eq!(blobs.len(), 1);
        // Contour runs through pixel centres: (w-1)(h-1).
        assert_eq!(blobs[0].area, 50.0);
        assert_eq!(blobs[0].bbox, Rect::new(5, 4, 11, 6));
        assert_eq!(blobs[0].center(), Point::new(10, 7));
    }

    #[test]
    fn test_blob_inside_hole_is_not_external() {
        // Ring 3px thick around a 9x9 hole, with a dot in the middle.
        let mut frame = Frame::filled(30, 30, RIVER);
        frame.fill_rect(5, 5, 15, 15, YELLOW);
        frame.fill_rect(8, 8, 9, 9, RIVER);
        frame.fill_rect(12, 12, 1, 1, YELLOW);
        let mask = HsvImage::from_frame(&frame)
            .unwrap()
            .in_range(&YELLOW_RANGE)
            .unwrap();
        let blobs = external_blobs(&mask).unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].bbox.width, 15);
        // Holes do not reduce the outer area.
        assert_eq!(blobs[0].area, 196.0);
    }
}
