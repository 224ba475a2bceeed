//! Error taxonomy for the relay endpoints and the detector seam.

use thiserror::Error;

/// Errors surfaced in-band by the relay endpoints.
///
/// None of these are process-fatal: handlers catch them at the boundary
/// and return a structured error payload.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Request body carried no image payload.
    #[error("No image data provided")]
    MissingImage,

    /// Image payload was not valid base64.
    #[error("Invalid base64 image data: {0}")]
    DecodeFailure(String),

    /// Decoded bytes did not parse as a raster image.
    #[error("Failed to decode image")]
    InvalidImage,

    /// The detector errored or its worker task died.
    #[error("Detector failed: {0}")]
    DetectorFailure(String),

    /// Request lacked both accepted marker headers. A coarse request
    /// filter, not an authentication mechanism.
    #[error("Invalid request")]
    UnauthorizedRequest,

    /// Metrics frame report was missing a required timestamp field.
    #[error("missing required fields")]
    MissingFields,
}

/// Errors a detector strategy can report.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("frame dimensions unsupported: {width}x{height}")]
    BadDimensions { width: u32, height: u32 },

    #[error("inference failed: {0}")]
    Inference(String),
}
