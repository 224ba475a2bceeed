//! Frame ingest pipeline.
//!
//! Turns a base64 frame into a normalized [`DetectionResult`]: validate,
//! decode, run the detector, stamp timestamps, account bytes, and push
//! the result to detection subscribers. Validation failures short-circuit
//! with no side effects.

use image::RgbImage;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use relay_core::detection::{Detection, DetectionResult, FrameId, RawDetection};
use relay_core::error::RelayError;
use relay_core::metrics::{coerce_ms, now_ms};

use crate::state::AppState;

/// Body of `POST /detect`.
#[derive(Debug, Default, Deserialize)]
pub struct DetectRequest {
    /// Base64 image payload, optionally with a `data:image/...;base64,`
    /// prefix.
    #[serde(default)]
    pub image: String,
    pub frame_id: Option<FrameId>,
    /// Client capture timestamp; accepted as integer, float, or numeric
    /// string, passed through without clock correction.
    pub capture_ts: Option<Value>,
}

fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:image") {
        match data.split_once(',') {
            Some((_, b64)) => b64,
            None => data,
        }
    } else {
        data
    }
}

/// Ingest one frame.
///
/// On success the serialized result has already been broadcast to every
/// detection subscriber and the byte counters updated; the result is
/// returned to the HTTP caller whether or not any subscriber is
/// connected. A detector error is logged and yields an empty detection
/// list rather than failing the request.
pub async fn ingest_frame(
    state: &AppState,
    req: DetectRequest,
) -> Result<DetectionResult, RelayError> {
    if req.image.is_empty() {
        return Err(RelayError::MissingImage);
    }
    let bytes = BASE64
        .decode(strip_data_url(&req.image))
        .map_err(|e| RelayError::DecodeFailure(e.to_string()))?;
    let byte_len = bytes.len() as u64;
    let recv_ts = now_ms();

    // Raster decode and inference are CPU-bound; keep them off the
    // reactor so unrelated connections are not stalled.
    let detector = state.detector.clone();
    let (width, height, raw) = tokio::task::spawn_blocking(
        move || -> Result<(u32, u32, Vec<RawDetection>), RelayError> {
            let frame: RgbImage = image::load_from_memory(&bytes)
                .map_err(|_| RelayError::InvalidImage)?
                .to_rgb8();
            let (w, h) = frame.dimensions();
            let raw = match detector.detect(&frame) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(detector = detector.name(), error = %e,
                        "detector failed, emitting empty result");
                    Vec::new()
                }
            };
            Ok((w, h, raw))
        },
    )
    .await
    .map_err(|e| RelayError::DetectorFailure(e.to_string()))??;
    let inference_ts = now_ms();

    let detections: Vec<Detection> = raw
        .iter()
        .map(|r| Detection::from_raw(r, width, height))
        .collect();

    let result = DetectionResult {
        frame_id: req.frame_id.unwrap_or_default(),
        capture_ts: coerce_ms(req.capture_ts.as_ref()),
        recv_ts,
        inference_ts,
        detections,
    };

    // Side effects only once the frame is fully validated.
    state.metrics.lock().unwrap().add_uplink(byte_len);

    match serde_json::to_string(&result) {
        Ok(payload) => {
            let delivered = state.subscribers.broadcast(&payload, None);
            if delivered > 0 {
                // Downlink counts bytes actually placed on the wire, so
                // N subscribers add N times the payload size.
                state
                    .metrics
                    .lock()
                    .unwrap()
                    .add_downlink(delivered as u64 * payload.len() as u64);
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize detection result for broadcast"),
    }

    Ok(result)
}
