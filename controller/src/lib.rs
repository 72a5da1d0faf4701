//! # Concourse Controller
//!
//! Central coordinator of a simulated marketplace. Suppliers, retailers and
//! carriers announce themselves on a shared event bus; the controller keeps
//! the registry of who is connected, assigns supply and transport jobs,
//! watches the choreography for participants that stop responding, drives
//! customer sessions connected over WebSocket and streams every change to
//! dashboard viewers.
//!
//! ## Layout
//!
//! - [`registry`]: the marketplace state
//! - [`engine`]: exclusive access to that state, plus topology changes
//! - [`customer`]: customer session state machine
//! - [`scheduler`]: job assignment
//! - [`watchdog`]: expectation timers
//! - [`dispatcher`]: inbound event routing
//! - [`outbox`]: ordered outbound publishing
//! - [`state`]: the shared [`Controller`] handle
//! - [`consumer`]: bus subscribe/reconnect loop
//! - [`server`]: HTTP and WebSocket routes

pub mod config;
pub mod consumer;
pub mod customer;
pub mod dispatcher;
pub mod engine;
pub mod notice;
pub mod outbox;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod state;
pub mod watchdog;

pub use config::{Config, ConfigError, Timings};
pub use consumer::BusConsumer;
pub use engine::Engine;
pub use outbox::{Outbound, Outbox, OutboxReceiver};
pub use state::Controller;
