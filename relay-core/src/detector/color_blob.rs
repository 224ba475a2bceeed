//! Heuristic color-blob detection.
//!
//! Classifies pixels into a small set of HSV color ranges, cleans each
//! mask with a morphological open/close pass, and reports the bounding
//! box of every connected component that looks like a plausible object.

use std::collections::HashMap;

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::Detector;
use crate::detection::RawDetection;
use crate::error::DetectorError;

/// Components smaller than this (in pixels) are noise.
const MIN_AREA: u32 = 300;
/// Area at which confidence saturates.
const CONFIDENCE_AREA: f64 = 8_000.0;
/// Accepted bounding-box aspect ratio band (width / height).
const MIN_ASPECT: f64 = 0.2;
const MAX_ASPECT: f64 = 5.0;

/// One inclusive HSV range. Hue uses the halved 0..=180 scale so each
/// channel fits a byte.
struct HsvRange {
    lo: [u8; 3],
    hi: [u8; 3],
}

struct ColorClass {
    label: &'static str,
    ranges: &'static [HsvRange],
}

// Red hue wraps around zero, so it gets two ranges.
const COLOR_CLASSES: &[ColorClass] = &[
    ColorClass {
        label: "red",
        ranges: &[
            HsvRange { lo: [0, 50, 50], hi: [10, 255, 255] },
            HsvRange { lo: [170, 50, 50], hi: [180, 255, 255] },
        ],
    },
    ColorClass {
        label: "blue",
        ranges: &[HsvRange { lo: [100, 50, 50], hi: [130, 255, 255] }],
    },
    ColorClass {
        label: "green",
        ranges: &[HsvRange { lo: [40, 50, 50], hi: [80, 255, 255] }],
    },
    ColorClass {
        label: "yellow",
        ranges: &[HsvRange { lo: [20, 50, 50], hi: [40, 255, 255] }],
    },
];

/// Heuristic detector finding saturated color blobs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ColorBlobDetector;

impl ColorBlobDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for ColorBlobDetector {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::BadDimensions { width, height });
        }

        // One HSV pass shared by all color classes.
        let hsv: Vec<[u8; 3]> = frame.pixels().map(|&Rgb([r, g, b])| rgb_to_hsv(r, g, b)).collect();

        let mut detections = Vec::new();
        for class in COLOR_CLASSES {
            let mut mask = GrayImage::new(width, height);
            for (i, px) in hsv.iter().enumerate() {
                if class.ranges.iter().any(|r| in_range(px, r)) {
                    mask.put_pixel(i as u32 % width, i as u32 / width, Luma([255u8]));
                }
            }
            // 3x3 open then close: drop speckle, bridge small gaps.
            let mask = close(&open(&mask, Norm::LInf, 1), Norm::LInf, 1);
            let labelled = connected_components(&mask, Connectivity::Four, Luma([0u8]));
            detections.extend(components_to_detections(&labelled, class.label));
        }
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "color-blob"
    }
}

fn in_range(px: &[u8; 3], range: &HsvRange) -> bool {
    (0..3).all(|c| range.lo[c] <= px[c] && px[c] <= range.hi[c])
}

/// Convert an RGB pixel to HSV with hue on 0..=180 and S/V on 0..=255.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= f64::EPSILON {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let sat = if max > 0.0 { delta / max } else { 0.0 };

    [
        (hue / 2.0).round().min(180.0) as u8,
        (sat * 255.0).round() as u8,
        (max * 255.0).round() as u8,
    ]
}

fn components_to_detections(
    labelled: &ImageBuffer<Luma<u32>, Vec<u32>>,
    label: &str,
) -> Vec<RawDetection> {
    struct Extent {
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
        area: u32,
    }

    let mut extents: HashMap<u32, Extent> = HashMap::new();
    for (x, y, px) in labelled.enumerate_pixels() {
        let id = px.0[0];
        if id == 0 {
            continue;
        }
        let e = extents.entry(id).or_insert(Extent {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            area: 0,
        });
        e.min_x = e.min_x.min(x);
        e.min_y = e.min_y.min(y);
        e.max_x = e.max_x.max(x);
        e.max_y = e.max_y.max(y);
        e.area += 1;
    }

    extents
        .into_values()
        .filter_map(|e| {
            if e.area <= MIN_AREA {
                return None;
            }
            let w = (e.max_x - e.min_x + 1) as f64;
            let h = (e.max_y - e.min_y + 1) as f64;
            let aspect = w / h;
            if aspect <= MIN_ASPECT || aspect >= MAX_ASPECT {
                return None;
            }
            Some(RawDetection {
                bbox: [
                    e.min_x as f64,
                    e.min_y as f64,
                    (e.max_x + 1) as f64,
                    (e.max_y + 1) as f64,
                ],
                confidence: (e.area as f64 / CONFIDENCE_AREA).min(0.95),
                label: label.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_rect(
        width: u32,
        height: u32,
        rect: (u32, u32, u32, u32),
        color: Rgb<u8>,
    ) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        let (x0, y0, x1, y1) = rect;
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, color);
            }
        }
        img
    }

    #[test]
    fn finds_a_red_square() {
        let frame = frame_with_rect(64, 64, (10, 10, 40, 40), Rgb([255, 0, 0]));
        let detections = ColorBlobDetector::new().detect(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.label, "red");
        // Morphology may shave a pixel off each edge.
        assert!(det.bbox[0] >= 9.0 && det.bbox[0] <= 12.0);
        assert!(det.bbox[2] >= 38.0 && det.bbox[2] <= 41.0);
        assert!(det.confidence > 0.08 && det.confidence < 0.15);
    }

    #[test]
    fn finds_a_blue_square() {
        let frame = frame_with_rect(64, 64, (5, 5, 35, 35), Rgb([0, 0, 255]));
        let detections = ColorBlobDetector::new().detect(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "blue");
    }

    #[test]
    fn ignores_unsaturated_frames() {
        let frame = RgbImage::from_pixel(64, 64, Rgb([128, 128, 128]));
        let detections = ColorBlobDetector::new().detect(&frame).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn rejects_small_blobs() {
        // 10x10 = 100 px, below the area threshold.
        let frame = frame_with_rect(64, 64, (10, 10, 20, 20), Rgb([0, 255, 0]));
        let detections = ColorBlobDetector::new().detect(&frame).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn rejects_extreme_aspect_ratios() {
        // 4 x 160 strip: area passes, aspect 0.025 does not.
        let frame = frame_with_rect(64, 200, (30, 10, 34, 170), Rgb([255, 255, 0]));
        let detections = ColorBlobDetector::new().detect(&frame).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn empty_frames_are_an_error() {
        let frame = RgbImage::new(0, 0);
        assert!(matches!(
            ColorBlobDetector::new().detect(&frame),
            Err(DetectorError::BadDimensions { .. })
        ));
    }

    #[test]
    fn hsv_conversion_matches_reference_points() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(255, 255, 0), [30, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(255, 255, 255), [0, 0, 255]);
    }
}
