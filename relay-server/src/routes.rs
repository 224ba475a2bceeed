//! HTTP route table and request handlers.
//!
//! Every route is mounted both bare and under `/api`; clients use either
//! prefix interchangeably. Validation errors are reported in-band as
//! `{"error": reason}` with HTTP 200, matching the reference clients'
//! expectations; no request error is ever process-fatal.

use std::path::Path;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::warn;

use relay_core::error::RelayError;
use relay_core::metrics::{FrameSample, MetricsSnapshot};

use crate::pipeline::{ingest_frame, DetectRequest};
use crate::state::AppState;
use crate::ws::{detection_ws, signaling_ws};

/// Marker headers accepted by the coarse request filter on `/detect`.
///
/// A low-assurance heuristic against blind cross-site posts, not a
/// security boundary: the bundled clients always send one of the two.
const MARKER_HEADER: &str = "x-requested-with";
const TUNNEL_BYPASS_HEADER: &str = "ngrok-skip-browser-warning";

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes())
        .nest("/api", routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/detect", post(detect))
        .route("/metrics", get(metrics_get))
        .route("/metrics/frame", post(metrics_frame))
        .route("/metrics/reset", post(metrics_reset))
        .route("/ws", get(signaling_ws))
        .route("/ws/detection", get(detection_ws))
}

fn error_body(err: &RelayError) -> Json<Value> {
    Json(json!({ "error": err.to_string() }))
}

async fn detect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DetectRequest>,
) -> Json<Value> {
    if !headers.contains_key(MARKER_HEADER) && !headers.contains_key(TUNNEL_BYPASS_HEADER) {
        return error_body(&RelayError::UnauthorizedRequest);
    }
    match ingest_frame(&state, req).await {
        Ok(result) => Json(
            serde_json::to_value(&result)
                .unwrap_or_else(|_| json!({ "error": "serialization failed" })),
        ),
        Err(err) => error_body(&err),
    }
}

async fn metrics_frame(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    match FrameSample::from_value(&body) {
        Ok(sample) => {
            state.metrics.lock().unwrap().record_frame(sample);
            Json(json!({ "ok": true }))
        }
        Err(err) => error_body(&err),
    }
}

async fn metrics_reset(State(state): State<AppState>) -> Json<Value> {
    state.metrics.lock().unwrap().reset();
    Json(json!({ "ok": true }))
}

async fn metrics_get(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.metrics.lock().unwrap().compute();

    // Best-effort persistence off the hot path; failures are logged and
    // never affect the response.
    let path = state.config.metrics_path.clone();
    let persisted = snapshot.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = persist_snapshot(&path, &persisted) {
            warn!(path = %path.display(), error = %e, "failed to persist metrics snapshot");
        }
    });

    Json(
        serde_json::to_value(&snapshot)
            .unwrap_or_else(|_| json!({ "error": "serialization failed" })),
    )
}

fn persist_snapshot(path: &Path, snapshot: &MetricsSnapshot) -> std::io::Result<()> {
    let body = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, body)
}
