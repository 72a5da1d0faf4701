//! Event bus abstraction.
//!
//! The controller and every marketplace participant share one fan-out topic.
//! This module provides the [`EventBus`] trait that the controller publishes to
//! and consumes from; the transport behind it (Kafka-compatible brokers in
//! production, an in-memory channel in tests) is an external collaborator.
//!
//! # Architecture
//!
//! ```text
//!  Supplier  Retailer  Carrier  Passenger
//!      │         │        │         │
//!      └─────────┴───┬────┴─────────┘
//!                    ▼
//!           ┌─────────────────┐
//!           │  fan-out topic  │
//!           └────────┬────────┘
//!                    │ subscribe
//!                    ▼
//!           ┌─────────────────┐
//!           │   Controller    │──── publish (jobs, resets, evictions)
//!           └─────────────────┘
//! ```
//!
//! # Delivery
//!
//! The controller processes each delivered message at most once. Messages are
//! raw [`BusMessage`] values so they can be republished verbatim.
//!
//! # Implementations
//!
//! - `InMemoryEventBus` in `concourse-testing`
//! - `RedpandaEventBus` in `concourse-redpanda`

use crate::event::BusMessage;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Stream of raw messages from a subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<BusMessage, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be used as `Arc<dyn EventBus>`; the controller's outbox and bus
/// consumer both hold the bus that way.
pub trait EventBus: Send + Sync {
    /// Publish a message to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the publish operation fails.
    fn publish(
        &self,
        topic: &str,
        message: &BusMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of messages.
    ///
    /// The stream ends when the underlying connection is lost; callers are
    /// expected to resubscribe.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
