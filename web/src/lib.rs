//! Axum integration for the Concourse controller.
//!
//! The controller's HTTP surface is small: a JSON snapshot, a metrics scrape
//! and two WebSocket endpoints. This crate holds the pieces that are not
//! specific to the marketplace engine:
//!
//! - [`AppError`]: handler errors rendered as JSON responses
//! - [`BroadcastHub`]: fan-out of dashboard notifications to every viewer
//! - [`handlers::viewer`]: the per-viewer WebSocket pump
//! - [`handlers::health`]: liveness
//!
//! # Architecture
//!
//! ```text
//!   engine (under lock)          BroadcastHub             viewers
//!          │                          │                      │
//!          ├── broadcast(json) ──────>│── bounded buffer ───>│ ws_view
//!          │    (never blocks)        │── bounded buffer ───>│ ws_view
//!          │                          │   lagging viewer is  │
//!          │                          │   disconnected       │
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod hub;

pub use error::AppError;
pub use hub::BroadcastHub;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
