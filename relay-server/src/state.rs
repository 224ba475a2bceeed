//! Shared server state.

use std::sync::{Arc, Mutex};

use relay_core::detector::{build_detector, Detector};
use relay_core::metrics::MetricsState;

use crate::config::ServerConfig;
use crate::hub::ClientRegistry;

/// State handle cloned into every handler.
///
/// Built once at startup. The two registries are disjoint: a connection
/// lives in `peers` or `subscribers`, never both. All mutation happens
/// behind the registry and metrics locks; no lock is held across an
/// await point.
#[derive(Clone)]
pub struct AppState {
    pub peers: Arc<ClientRegistry>,
    pub subscribers: Arc<ClientRegistry>,
    pub metrics: Arc<Mutex<MetricsState>>,
    pub detector: Arc<dyn Detector>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let detector = build_detector(config.detector);
        Self::with_detector(config, detector)
    }

    /// Construct with an explicit detector (tests inject mocks here).
    pub fn with_detector(config: ServerConfig, detector: Arc<dyn Detector>) -> Self {
        Self {
            peers: Arc::new(ClientRegistry::new()),
            subscribers: Arc::new(ClientRegistry::new()),
            metrics: Arc::new(Mutex::new(MetricsState::new(config.metrics_retention))),
            detector,
            config: Arc::new(config),
        }
    }
}
