//! # relay
//!
//! Real-time `WebSocket` broadcast hub: every frame a client sends is fanned
//! out to every other currently-connected client.
//!
//! - `ws::hub` — shared registry of live connections and broadcast fan-out
//! - `ws::socket` — per-connection read/write loops and liveness probing
//! - HTTP endpoints: `/ws` upgrade, `/health`, `/metrics`
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod ws;
