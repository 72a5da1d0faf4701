//! Bus consumer with automatic reconnection.
//!
//! The consumer runs a subscribe-process-reconnect loop:
//!
//! ```text
//! loop {
//!     subscribe (retrying with backoff)
//!     announce Reset so every participant reconnects
//!     process messages one at a time until the stream ends
//! }
//! ```
//!
//! Processing never fails: undecodable messages are logged and skipped by the
//! controller. The loop exits only on the shutdown signal.

use crate::state::Controller;
use concourse_core::{EventBus, EventBusError, EventStream};
use concourse_runtime::{RetryPolicy, retry_with_backoff};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Feeds bus messages into the controller.
pub struct BusConsumer {
    controller: Controller,
    bus: Arc<dyn EventBus>,
    topic: String,
    policy: RetryPolicy,
    shutdown: broadcast::Receiver<()>,
}

impl BusConsumer {
    /// Create a consumer for `topic`.
    #[must_use]
    pub fn new(
        controller: Controller,
        bus: Arc<dyn EventBus>,
        topic: impl Into<String>,
        policy: RetryPolicy,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            controller,
            bus,
            topic: topic.into(),
            policy,
            shutdown,
        }
    }

    /// Spawn the consumer as a background task.
    #[must_use]
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run until the shutdown signal fires.
    pub async fn run(&mut self) {
        info!(topic = %self.topic, "Bus consumer started");

        loop {
            let subscription = subscribe(
                Arc::clone(&self.bus),
                self.topic.clone(),
                self.policy.clone(),
            );
            let subscribed = tokio::select! {
                _ = self.shutdown.recv() => break,
                subscribed = subscription => subscribed,
            };
            let mut stream = match subscribed {
                Ok(stream) => stream,
                Err(e) => {
                    error!(topic = %self.topic, error = %e, "Giving up on bus subscription");
                    break;
                }
            };

            info!(topic = %self.topic, "Subscribed to bus");
            self.controller.announce_reset();

            if self.process_stream(&mut stream).await {
                break;
            }
            warn!(topic = %self.topic, "Bus stream ended, reconnecting");
        }

        info!(topic = %self.topic, "Bus consumer stopped");
    }

    /// Process until the stream ends. Returns `true` on shutdown.
    async fn process_stream(&mut self, stream: &mut EventStream) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => return true,
                next = stream.next() => match next {
                    Some(Ok(message)) => self.controller.process(&message).await,
                    Some(Err(e)) => {
                        error!(topic = %self.topic, error = %e, "Error receiving from bus");
                    }
                    None => return false,
                },
            }
        }
    }
}

async fn subscribe(
    bus: Arc<dyn EventBus>,
    topic: String,
    policy: RetryPolicy,
) -> Result<EventStream, EventBusError> {
    retry_with_backoff(policy, move || {
        let bus = Arc::clone(&bus);
        let topic = topic.clone();
        async move { bus.subscribe(&[topic.as_str()]).await }
    })
    .await
}
