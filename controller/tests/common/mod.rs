//! Shared harness for controller integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use concourse_controller::{Controller, Outbound, Outbox, OutboxReceiver, Timings};
use concourse_core::{BusMessage, CloudEvent};
use concourse_web::BroadcastHub;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// A controller wired to in-process outputs.
pub struct Harness {
    pub controller: Controller,
    outbound: OutboxReceiver,
    viewer: broadcast::Receiver<String>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_timings(Timings::default())
    }

    pub fn with_timings(timings: Timings) -> Self {
        let hub = BroadcastHub::new(4096);
        let viewer = hub.subscribe();
        let (outbox, outbound) = Outbox::channel();
        Self {
            controller: Controller::new(hub, outbox, timings),
            outbound,
            viewer,
        }
    }

    /// Feed an event as if it arrived from the bus.
    pub async fn deliver(&self, event: &CloudEvent) {
        self.controller.process(&event.to_message()).await;
    }

    /// Feed a raw message as if it arrived from the bus.
    pub async fn deliver_raw(&self, message: &BusMessage) {
        self.controller.process(message).await;
    }

    /// Everything queued for the bus since the last call.
    pub fn outbound(&mut self) -> Vec<Outbound> {
        self.outbound.drain()
    }

    /// Queued controller events since the last call, decoded.
    pub fn published(&mut self) -> Vec<CloudEvent> {
        self.outbound()
            .iter()
            .map(|item| CloudEvent::from_message(&item.to_message()).unwrap())
            .collect()
    }

    /// Dashboard notices since the last call.
    pub fn notices(&mut self) -> Vec<Value> {
        let mut notices = Vec::new();
        while let Ok(text) = self.viewer.try_recv() {
            notices.push(serde_json::from_str(&text).unwrap());
        }
        notices
    }

    /// Dashboard notices of one `type` since the last call. Other notices are discarded.
    pub fn notices_of(&mut self, kind: &str) -> Vec<Value> {
        self.notices()
            .into_iter()
            .filter(|n| n["type"] == kind)
            .collect()
    }

    /// Join retailer `index` as a new customer.
    pub async fn join(&self, index: usize) -> Customer {
        let (client, messages) = mpsc::unbounded_channel();
        let id = self
            .controller
            .join(index, client, None)
            .await
            .expect("join accepted");
        let mut customer = Customer { id, messages };
        assert_eq!(customer.next(), Some(format!("i{}", customer.id)));
        customer
    }

    pub async fn snapshot(&self) -> Value {
        self.controller.snapshot().await.unwrap()
    }

    /// Connect one retailer, one supplier and one carrier, then clear outputs.
    pub async fn small_marketplace(&mut self) {
        use concourse_testing::fixtures;
        self.deliver(&fixtures::retailer_connection("Retailer.north", "North", "n.png"))
            .await;
        self.deliver(&fixtures::connection("Supplier.acme", "a.png")).await;
        self.deliver(&fixtures::connection("Carrier.van", "v.png")).await;
        self.outbound();
        self.notices();
    }
}

/// Client side of a customer connection.
pub struct Customer {
    pub id: String,
    messages: mpsc::UnboundedReceiver<String>,
}

impl Customer {
    /// Next message already sent to this customer, if any.
    pub fn next(&mut self) -> Option<String> {
        self.messages.try_recv().ok()
    }

    /// Every message sent to this customer since the last call.
    pub fn all(&mut self) -> Vec<String> {
        let mut all = Vec::new();
        while let Some(message) = self.next() {
            all.push(message);
        }
        all
    }
}

/// Let paused time run slightly past `duration` so timers due by then fire.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration + Duration::from_millis(1)).await;
}
