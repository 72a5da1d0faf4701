//! # Concourse Runtime
//!
//! Execution support for the controller engine:
//!
//! - [`deferred`]: cancellable, delayed callbacks used for every self-driven
//!   timer (customer auto-advance, order timeouts, watchdog expiry, simulated
//!   transit)
//! - [`retry`]: exponential backoff for bus reconnects
//! - [`metrics`]: Prometheus metric descriptions and recorders

pub mod deferred;
pub mod metrics;
pub mod retry;

pub use deferred::Deferred;
pub use retry::{RetryPolicy, retry_with_backoff};
