//! Detector capability and its concrete strategies.
//!
//! The relay is agnostic to how detections are produced: it holds a
//! `dyn Detector` chosen once at startup from configuration. Strategies
//! must tolerate concurrent calls and must not retain references to the
//! frame after returning.

mod color_blob;
mod null;

use std::str::FromStr;
use std::sync::Arc;

use image::RgbImage;

pub use color_blob::ColorBlobDetector;
pub use null::NullDetector;

use crate::detection::RawDetection;
use crate::error::DetectorError;

/// An object detector over decoded RGB frames.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<RawDetection>, DetectorError>;

    /// Short strategy name for logs.
    fn name(&self) -> &'static str;
}

/// Detector strategy, selected once at construction from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    /// Heuristic color-blob detection.
    ColorBlob,
    /// No detection; frames pass through with empty results.
    Null,
}

impl FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "color" | "color-blob" => Ok(DetectorKind::ColorBlob),
            "null" | "none" => Ok(DetectorKind::Null),
            other => Err(format!("unknown detector strategy: {other}")),
        }
    }
}

/// Construct the configured detector strategy.
pub fn build_detector(kind: DetectorKind) -> Arc<dyn Detector> {
    match kind {
        DetectorKind::ColorBlob => Arc::new(ColorBlobDetector::new()),
        DetectorKind::Null => Arc::new(NullDetector),
    }
}
