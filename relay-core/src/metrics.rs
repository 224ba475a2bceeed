//! Latency and throughput telemetry over per-frame timestamp samples.
//!
//! Clients report one [`FrameSample`] per completed frame round trip; the
//! ingest pipeline feeds the byte counters. [`MetricsState::compute`]
//! turns the current window into a [`MetricsSnapshot`] on demand.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::detection::FrameId;
use crate::error::RelayError;

/// Default retention cap on the frame-sample window.
pub const DEFAULT_RETENTION: usize = 10_000;

/// Current epoch time in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Coerce a JSON value to epoch milliseconds.
///
/// Accepts integers, floats, and numeric strings; anything else is
/// rejected.
pub fn coerce_ms(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if let Some(f) = value.as_f64() {
        return Some(f as i64);
    }
    value.as_str().and_then(|s| s.trim().parse().ok())
}

/// Four-timestamp record for one video frame's round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    pub frame_id: FrameId,
    pub capture_ts: i64,
    pub recv_ts: i64,
    pub inference_ts: i64,
    pub overlay_display_ts: i64,
}

impl FrameSample {
    /// Build a sample from a client report, requiring all four timestamps
    /// to be present and coercible to integers.
    pub fn from_value(value: &Value) -> Result<Self, RelayError> {
        let obj = value.as_object().ok_or(RelayError::MissingFields)?;
        let frame_id = obj.get("frame_id").ok_or(RelayError::MissingFields)?;
        let frame_id: FrameId =
            serde_json::from_value(frame_id.clone()).map_err(|_| RelayError::MissingFields)?;
        Ok(Self {
            frame_id,
            capture_ts: coerce_ms(obj.get("capture_ts")).ok_or(RelayError::MissingFields)?,
            recv_ts: coerce_ms(obj.get("recv_ts")).ok_or(RelayError::MissingFields)?,
            inference_ts: coerce_ms(obj.get("inference_ts")).ok_or(RelayError::MissingFields)?,
            overlay_display_ts: coerce_ms(obj.get("overlay_display_ts"))
                .ok_or(RelayError::MissingFields)?,
        })
    }
}

/// Computed statistics over the current sample window.
///
/// Latency fields are `None` when no sample passed the respective
/// monotonicity filter; rate fields are zero rather than absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub count_frames: usize,
    pub median_e2e_ms: Option<f64>,
    pub p95_e2e_ms: Option<f64>,
    pub server_latency_median_ms: Option<f64>,
    pub network_latency_median_ms: Option<f64>,
    pub processed_fps: f64,
    pub uplink_kbps: f64,
    pub downlink_kbps: f64,
}

impl MetricsSnapshot {
    fn empty() -> Self {
        Self {
            count_frames: 0,
            median_e2e_ms: None,
            p95_e2e_ms: None,
            server_latency_median_ms: None,
            network_latency_median_ms: None,
            processed_fps: 0.0,
            uplink_kbps: 0.0,
            downlink_kbps: 0.0,
        }
    }
}

/// Process-wide telemetry state: the retained sample window, cumulative
/// byte counters, and the timestamp of the last reset.
///
/// The sample window is capped; once `retention` samples are held, the
/// oldest is evicted on each append so long-running sessions without a
/// periodic reset stay bounded.
#[derive(Debug)]
pub struct MetricsState {
    samples: VecDeque<FrameSample>,
    uplink_bytes: u64,
    downlink_bytes: u64,
    start_ts: Option<i64>,
    retention: usize,
}

impl MetricsState {
    pub fn new(retention: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            uplink_bytes: 0,
            downlink_bytes: 0,
            start_ts: None,
            retention: retention.max(1),
        }
    }

    /// Drop all samples, zero the counters, and stamp a new start time.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.uplink_bytes = 0;
        self.downlink_bytes = 0;
        self.start_ts = Some(now_ms());
    }

    /// Append a completed frame sample, evicting the oldest past the cap.
    pub fn record_frame(&mut self, sample: FrameSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.retention {
            trace!("evicting oldest frame sample past retention cap");
            self.samples.pop_front();
        }
    }

    pub fn add_uplink(&mut self, bytes: u64) {
        self.uplink_bytes += bytes;
    }

    pub fn add_downlink(&mut self, bytes: u64) {
        self.downlink_bytes += bytes;
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn uplink_bytes(&self) -> u64 {
        self.uplink_bytes
    }

    pub fn downlink_bytes(&self) -> u64 {
        self.downlink_bytes
    }

    /// Compute statistics over the current window. Pure read.
    ///
    /// Samples violating monotonicity are excluded from the affected
    /// statistic only, never dropped globally.
    pub fn compute(&self) -> MetricsSnapshot {
        if self.samples.is_empty() {
            return MetricsSnapshot::empty();
        }

        let mut e2e = Vec::new();
        let mut server_lat = Vec::new();
        let mut net_lat = Vec::new();
        let mut max_display = i64::MIN;
        let mut min_capture = i64::MAX;

        for s in &self.samples {
            if s.overlay_display_ts >= s.capture_ts {
                e2e.push(s.overlay_display_ts - s.capture_ts);
            }
            if s.inference_ts >= s.recv_ts {
                server_lat.push(s.inference_ts - s.recv_ts);
            }
            if s.recv_ts >= s.capture_ts {
                net_lat.push(s.recv_ts - s.capture_ts);
            }
            max_display = max_display.max(s.overlay_display_ts);
            min_capture = min_capture.min(s.capture_ts);
        }

        let duration_ms = match self.start_ts {
            Some(start) => max_display - start,
            None => max_display - min_capture,
        };
        let duration_s = (duration_ms as f64 / 1000.0).max(1e-3);

        MetricsSnapshot {
            count_frames: self.samples.len(),
            median_e2e_ms: median(&mut e2e),
            p95_e2e_ms: p95(&mut e2e),
            server_latency_median_ms: median(&mut server_lat),
            network_latency_median_ms: median(&mut net_lat),
            processed_fps: self.samples.len() as f64 / duration_s,
            uplink_kbps: self.uplink_bytes as f64 * 8.0 / duration_s / 1000.0,
            downlink_kbps: self.downlink_bytes as f64 * 8.0 / duration_s / 1000.0,
        }
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

/// Median of the values; even counts average the two middle elements.
fn median(values: &mut [i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let n = values.len();
    if n % 2 == 1 {
        Some(values[n / 2] as f64)
    } else {
        Some((values[n / 2 - 1] + values[n / 2]) as f64 / 2.0)
    }
}

/// Nearest-rank 95th percentile: sort ascending, take floor(0.95 * (n-1)).
fn p95(values: &mut [i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let idx = (0.95 * (values.len() - 1) as f64).floor() as usize;
    Some(values[idx] as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn sample(capture: i64, recv: i64, inference: i64, display: i64) -> FrameSample {
        FrameSample {
            frame_id: FrameId::Number(capture),
            capture_ts: capture,
            recv_ts: recv,
            inference_ts: inference,
            overlay_display_ts: display,
        }
    }

    #[test]
    fn empty_state_computes_zeros_and_nulls() {
        let state = MetricsState::default();
        let snap = state.compute();
        assert_eq!(snap.count_frames, 0);
        assert!(snap.median_e2e_ms.is_none());
        assert!(snap.p95_e2e_ms.is_none());
        assert!(snap.server_latency_median_ms.is_none());
        assert!(snap.network_latency_median_ms.is_none());
        assert_eq!(snap.processed_fps, 0.0);
        assert_eq!(snap.uplink_kbps, 0.0);
        assert_eq!(snap.downlink_kbps, 0.0);
    }

    #[test]
    fn reset_then_compute_is_empty_not_an_error() {
        let mut state = MetricsState::default();
        state.record_frame(sample(0, 10, 20, 50));
        state.add_uplink(1_000);
        state.reset();
        let snap = state.compute();
        assert_eq!(snap.count_frames, 0);
        assert!(snap.median_e2e_ms.is_none());
        assert_eq!(snap.uplink_kbps, 0.0);
    }

    #[test]
    fn p95_uses_nearest_rank() {
        let mut state = MetricsState::default();
        // e2e = [50, 40, 60, 80]; sorted [40, 50, 60, 80];
        // index floor(0.95 * 3) = 2 -> 60.
        state.record_frame(sample(0, 10, 15, 50));
        state.record_frame(sample(100, 110, 115, 140));
        state.record_frame(sample(200, 210, 215, 260));
        state.record_frame(sample(300, 310, 315, 380));
        let snap = state.compute();
        assert_eq!(snap.count_frames, 4);
        assert_relative_eq!(snap.p95_e2e_ms.unwrap(), 60.0);
        // Even count: median averages 50 and 60.
        assert_relative_eq!(snap.median_e2e_ms.unwrap(), 55.0);
    }

    #[test]
    fn non_monotonic_samples_are_excluded_per_statistic() {
        let mut state = MetricsState::default();
        state.record_frame(sample(100, 110, 120, 150));
        // Display before capture: excluded from e2e, kept elsewhere.
        state.record_frame(sample(200, 210, 220, 190));
        let snap = state.compute();
        assert_eq!(snap.count_frames, 2);
        assert_relative_eq!(snap.median_e2e_ms.unwrap(), 50.0);
        assert_relative_eq!(snap.server_latency_median_ms.unwrap(), 10.0);
        assert_relative_eq!(snap.network_latency_median_ms.unwrap(), 10.0);
    }

    #[test]
    fn duration_prefers_start_ts_when_set() {
        let mut state = MetricsState::default();
        state.reset();
        // Fabricate a window ending 2s after an epoch-ms start stamp.
        let start = now_ms();
        state.record_frame(sample(start, start + 10, start + 20, start + 2_000));
        state.add_uplink(1_000);
        let snap = state.compute();
        // duration ~= 2s, so fps ~= 0.5 and uplink ~= 4 kbps.
        assert!(snap.processed_fps > 0.4 && snap.processed_fps < 0.6);
        assert!(snap.uplink_kbps > 3.0 && snap.uplink_kbps < 5.0);
    }

    #[test]
    fn duration_is_floored_to_one_millisecond() {
        let mut state = MetricsState::default();
        // All timestamps identical: raw duration would be zero.
        state.record_frame(sample(100, 100, 100, 100));
        let snap = state.compute();
        assert!(snap.processed_fps.is_finite());
        assert_relative_eq!(snap.processed_fps, 1.0 / 1e-3);
    }

    #[test]
    fn retention_cap_evicts_oldest_first() {
        let mut state = MetricsState::new(3);
        for i in 0..5 {
            state.record_frame(sample(i * 100, i * 100 + 10, i * 100 + 20, i * 100 + 50));
        }
        assert_eq!(state.sample_count(), 3);
        let snap = state.compute();
        assert_eq!(snap.count_frames, 3);
        // Only samples with capture_ts 200, 300, 400 remain.
        assert_relative_eq!(snap.median_e2e_ms.unwrap(), 50.0);
    }

    #[test]
    fn counters_accumulate() {
        let mut state = MetricsState::default();
        state.add_uplink(100);
        state.add_uplink(250);
        state.add_downlink(4_000);
        assert_eq!(state.uplink_bytes(), 350);
        assert_eq!(state.downlink_bytes(), 4_000);
    }

    #[test]
    fn from_value_requires_all_fields() {
        let full = json!({
            "frame_id": "f1",
            "capture_ts": 1,
            "recv_ts": 2,
            "inference_ts": 3,
            "overlay_display_ts": 4,
        });
        let sample = FrameSample::from_value(&full).unwrap();
        assert_eq!(sample.overlay_display_ts, 4);

        let missing = json!({
            "frame_id": "f1",
            "capture_ts": 1,
            "recv_ts": 2,
            "inference_ts": 3,
        });
        assert!(matches!(
            FrameSample::from_value(&missing),
            Err(RelayError::MissingFields)
        ));
    }

    #[test]
    fn from_value_coerces_numeric_strings_and_floats() {
        let report = json!({
            "frame_id": 9,
            "capture_ts": "1000",
            "recv_ts": 1010.0,
            "inference_ts": 1020,
            "overlay_display_ts": "1050",
        });
        let sample = FrameSample::from_value(&report).unwrap();
        assert_eq!(sample.capture_ts, 1000);
        assert_eq!(sample.recv_ts, 1010);
        assert_eq!(sample.overlay_display_ts, 1050);

        let bad = json!({
            "frame_id": 9,
            "capture_ts": "soon",
            "recv_ts": 1010,
            "inference_ts": 1020,
            "overlay_display_ts": 1050,
        });
        assert!(FrameSample::from_value(&bad).is_err());
    }

    #[test]
    fn snapshot_serializes_with_contract_field_names() {
        let snap = MetricsState::default().compute();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["count_frames"], 0);
        assert!(json["median_e2e_ms"].is_null());
        assert!(json["p95_e2e_ms"].is_null());
        assert!(json["server_latency_median_ms"].is_null());
        assert!(json["network_latency_median_ms"].is_null());
        assert_eq!(json["processed_fps"], 0.0);
        assert_eq!(json["uplink_kbps"], 0.0);
        assert_eq!(json["downlink_kbps"], 0.0);
    }
}
