//! Real-time detection relay service.
//!
//! Relays annotated video-frame detections from the ingest endpoint to
//! live WebSocket subscribers, fans WebRTC signaling messages out among
//! peers, and aggregates end-to-end latency/throughput telemetry.

pub mod config;
pub mod hub;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod ws;
