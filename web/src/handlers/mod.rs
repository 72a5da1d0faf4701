//! HTTP and WebSocket handlers that do not depend on the engine.

pub mod health;
pub mod viewer;

pub use health::health_check;
