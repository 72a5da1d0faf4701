//! Outbound bus traffic.
//!
//! The engine never awaits while it holds the marketplace lock, so it cannot
//! publish directly. It queues [`Outbound`] items on an unbounded channel
//! instead, and a single forwarder task drains the channel in order and
//! publishes to the bus. Ordering of controller output is therefore the order
//! in which the engine produced it.

use concourse_core::{BusMessage, CONTROLLER_SOURCE, CloudEvent, EventBus};
use concourse_runtime::metrics::BusMetrics;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// One queued publish.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// An event produced by the controller
    Event(CloudEvent),
    /// A message republished byte for byte
    Resend(BusMessage),
}

impl Outbound {
    /// Transport form of this item.
    #[must_use]
    pub fn to_message(&self) -> BusMessage {
        match self {
            Self::Event(event) => event.to_message(),
            Self::Resend(message) => message.clone(),
        }
    }
}

/// Sending half, held by the controller.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::UnboundedSender<Outbound>,
}

/// Receiving half, owned by the forwarder.
#[derive(Debug)]
pub struct OutboxReceiver {
    receiver: mpsc::UnboundedReceiver<Outbound>,
}

impl Outbox {
    /// Create a connected outbox pair.
    #[must_use]
    pub fn channel() -> (Self, OutboxReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, OutboxReceiver { receiver })
    }

    /// Queue an event. Missing attributes are filled in; an empty source
    /// becomes the controller's own.
    pub fn publish(&self, mut event: CloudEvent) {
        if event.source.is_empty() {
            event.source = CONTROLLER_SOURCE.to_string();
        }
        self.push(Outbound::Event(event.with_defaults()));
    }

    /// Queue a raw message for verbatim republishing.
    pub fn resend(&self, message: BusMessage) {
        self.push(Outbound::Resend(message));
    }

    fn push(&self, item: Outbound) {
        if self.sender.send(item).is_err() {
            debug!("Outbox closed, dropping outbound message");
        }
    }
}

impl OutboxReceiver {
    /// Take everything queued so far without waiting.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut items = Vec::new();
        while let Ok(item) = self.receiver.try_recv() {
            items.push(item);
        }
        items
    }

    /// Wait for the next queued item. `None` once every [`Outbox`] is dropped.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.receiver.recv().await
    }

    /// Publish queued items to `topic` until every sender is gone.
    ///
    /// Publish failures are logged and counted; the item is not retried.
    pub async fn forward(mut self, bus: Arc<dyn EventBus>, topic: String) {
        info!(%topic, "Outbox forwarder started");
        while let Some(item) = self.receiver.recv().await {
            let message = item.to_message();
            match bus.publish(&topic, &message).await {
                Ok(()) => BusMetrics::record_publish(),
                Err(e) => {
                    BusMetrics::record_publish_error();
                    error!(%topic, error = %e, "Failed to publish outbound message");
                }
            }
        }
        info!(%topic, "Outbox forwarder stopped");
    }

    /// Run [`forward`](Self::forward) as a background task.
    #[must_use]
    pub fn spawn_forwarder(self, bus: Arc<dyn EventBus>, topic: String) -> JoinHandle<()> {
        tokio::spawn(self.forward(bus, topic))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use concourse_core::types;
    use concourse_testing::InMemoryEventBus;

    #[test]
    fn publish_stamps_source_and_defaults() {
        let (outbox, mut rx) = Outbox::channel();
        outbox.publish(CloudEvent::new(types::RESET, ""));

        let items = rx.drain();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Outbound::Event(_)));
        let event = CloudEvent::from_message(&items[0].to_message()).unwrap();
        assert_eq!(event.source, CONTROLLER_SOURCE);
        assert!(!event.id.is_empty());
        assert!(event.time.is_some());
    }

    #[test]
    fn resend_keeps_the_message_verbatim() {
        let (outbox, mut rx) = Outbox::channel();
        let original = CloudEvent::new(types::ORDER_RELEASED, "Retailer.r")
            .with_id("abc")
            .to_message();
        outbox.resend(original.clone());

        let items = rx.drain();
        assert_eq!(items[0].to_message(), original);
    }

    #[test]
    fn publishing_after_receiver_drop_is_silent() {
        let (outbox, rx) = Outbox::channel();
        drop(rx);
        outbox.publish(CloudEvent::new(types::RESET, CONTROLLER_SOURCE));
    }

    #[tokio::test]
    async fn forwarder_publishes_in_order_and_stops_when_senders_drop() {
        let bus = InMemoryEventBus::new();
        let (outbox, rx) = Outbox::channel();
        outbox.publish(CloudEvent::new(types::RESET, CONTROLLER_SOURCE));
        outbox.publish(CloudEvent::new(types::DISCONNECT, CONTROLLER_SOURCE).with_subject("Carrier.c"));
        drop(outbox);

        rx.forward(Arc::new(bus.clone()), "concourse".into()).await;

        let published: Vec<String> = bus
            .published_events()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(published, vec![types::RESET.to_string(), types::DISCONNECT.to_string()]);
    }
}
