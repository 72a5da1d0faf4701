//! # Concourse Testing
//!
//! Testing utilities for the Concourse controller.
//!
//! This crate provides:
//! - [`InMemoryEventBus`]: a broker-free [`EventBus`](concourse_core::EventBus)
//!   that records every published message
//! - [`fixtures`]: builders for the events marketplace participants put on the bus
//!
//! ## Example
//!
//! ```
//! use concourse_core::EventBus;
//! use concourse_testing::{fixtures, InMemoryEventBus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = InMemoryEventBus::new();
//! let message = fixtures::connection("Supplier.acme", "acme.png").to_message();
//! bus.publish("concourse", &message).await.unwrap();
//! assert_eq!(bus.published().len(), 1);
//! # }
//! ```

pub mod bus;
pub mod fixtures;

pub use bus::InMemoryEventBus;
