//! Wire types for frame detection results.
//!
//! A `RawDetection` is what a detector reports in pixel space; a
//! `Detection` is the normalized form clients consume. One
//! `DetectionResult` is produced per ingested frame and is both the HTTP
//! response body and the payload pushed to detection subscribers.

use serde::{Deserialize, Serialize};

/// Opaque frame identifier supplied by the capturing client.
///
/// Clients send either a string or an integer token; it is echoed back
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameId {
    Number(i64),
    Text(String),
}

impl Default for FrameId {
    fn default() -> Self {
        FrameId::Text("unknown".to_string())
    }
}

/// Detector output for one object, in pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// Bounding box as `[x1, y1, x2, y2]` in pixels.
    pub bbox: [f64; 4],
    pub confidence: f64,
    pub label: String,
}

/// One detected object with coordinates normalized to the frame size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub score: f64,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Detection {
    /// Normalize a pixel-space detection against the frame dimensions.
    ///
    /// Every coordinate is divided by the frame width/height and clamped
    /// to [0, 1]. Degenerate boxes (min beyond max) are passed through as
    /// the detector produced them; consumers must tolerate them.
    pub fn from_raw(raw: &RawDetection, width: u32, height: u32) -> Self {
        let w = width.max(1) as f64;
        let h = height.max(1) as f64;
        let [x1, y1, x2, y2] = raw.bbox;
        Self {
            label: raw.label.clone(),
            score: raw.confidence,
            xmin: (x1 / w).clamp(0.0, 1.0),
            ymin: (y1 / h).clamp(0.0, 1.0),
            xmax: (x2 / w).clamp(0.0, 1.0),
            ymax: (y2 / h).clamp(0.0, 1.0),
        }
    }
}

/// The result of one frame ingest.
///
/// Immutable once constructed. `capture_ts` is caller-supplied and may be
/// skewed relative to the server clock; it is passed through uncorrected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub frame_id: FrameId,
    pub capture_ts: Option<i64>,
    pub recv_ts: i64,
    pub inference_ts: i64,
    pub detections: Vec<Detection>,
}
