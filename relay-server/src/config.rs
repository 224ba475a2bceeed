//! Runtime configuration for the relay service.

use std::path::PathBuf;

use relay_core::detector::DetectorKind;
use relay_core::metrics::DEFAULT_RETENTION;

/// Service configuration, assembled once at startup from CLI arguments
/// and threaded into [`crate::state::AppState`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// File the latest metrics snapshot is persisted to on `GET /metrics`.
    pub metrics_path: PathBuf,
    /// Maximum retained frame samples before the oldest are evicted.
    pub metrics_retention: usize,
    /// Detector strategy.
    pub detector: DetectorKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_path: PathBuf::from("metrics.json"),
            metrics_retention: DEFAULT_RETENTION,
            detector: DetectorKind::ColorBlob,
        }
    }
}
