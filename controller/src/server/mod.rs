//! HTTP server for the controller.
//!
//! This module provides the Axum-based HTTP server with:
//! - Application state
//! - Registry snapshot and metrics endpoints
//! - Dashboard and customer WebSockets
//! - Router configuration

pub mod customer_ws;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
