//! Core types and algorithms for the detection relay service.
//!
//! This crate is synchronous and transport-agnostic: the wire types
//! exchanged with clients, the detector seam with its concrete
//! strategies, the error taxonomy, and the latency/throughput
//! aggregator. The HTTP/WebSocket service lives in `relay-server`.

pub mod detection;
pub mod detector;
pub mod error;
pub mod metrics;
