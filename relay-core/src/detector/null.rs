//! The no-op detector strategy.

use image::RgbImage;

use super::Detector;
use crate::detection::RawDetection;
use crate::error::DetectorError;

/// Detector that reports nothing.
///
/// Stands in when no inference strategy is configured; the ingest
/// pipeline, broadcast path, and telemetry stay fully exercised.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDetector;

impl Detector for NullDetector {
    fn detect(&self, _frame: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_empty() {
        let frame = RgbImage::new(8, 8);
        assert!(NullDetector.detect(&frame).unwrap().is_empty());
    }
}
