//! Customer sessions.
//!
//! A customer walks to a retailer, waits in its queue, orders once it reaches
//! the front and leaves when served. Two timers drive it without client input:
//! the walk (Walking to Inline) and the order/fulfillment deadline. Both are
//! owned by the customer, so removing it from its queue cancels them.
//!
//! ```text
//! Walking ──walk──> Inline ──front──> Ordering ──o<size>──> Ordered ──delivered──> Satisfied
//!                                        │                     │
//!                                        └──── timeout ────────┴──────> Satisfied (forced)
//!        any state ── disable/reset ──> Satisfied (closed)
//! ```

use crate::engine::Engine;
use crate::notice::Notice;
use crate::registry::Size;
use concourse_core::{CloudEvent, types};
use concourse_runtime::Deferred;
use concourse_runtime::metrics::CustomerMetrics;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outbound channel to the customer's WebSocket.
pub type ClientSender = mpsc::UnboundedSender<String>;

/// Lifecycle state. Only moves forward, or jumps to `Satisfied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CustomerState {
    /// On the way to the retailer
    Walking = 0,
    /// Queued behind someone
    Inline = 1,
    /// At the front, expected to pick a size
    Ordering = 2,
    /// Waiting for the delivery
    Ordered = 3,
    /// Done
    Satisfied = 4,
}

impl CustomerState {
    /// Whether `next` is a legal transition from `self`.
    #[must_use]
    pub const fn can_become(self, next: Self) -> bool {
        match (self, next) {
            (Self::Satisfied, _) => false,
            (_, Self::Satisfied) => true,
            _ => next as u8 == self as u8 + 1,
        }
    }
}

/// How a customer left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatisfyKind {
    /// Served
    Ok,
    /// Timed out
    Forced,
    /// Closed by disable, reset or retailer removal
    Closed,
}

impl SatisfyKind {
    /// Message sent to the client.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Ok => "s",
            Self::Forced => "f",
            Self::Closed => "c",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Forced => "forced",
            Self::Closed => "closed",
        }
    }
}

/// A customer queued at a retailer.
#[derive(Debug)]
pub struct Customer {
    /// Session id handed to the client
    pub id: String,
    state: CustomerState,
    client: Option<ClientSender>,
    timer: Option<Deferred>,
}

impl Customer {
    /// A new customer, still walking.
    #[must_use]
    pub const fn new(id: String, client: Option<ClientSender>) -> Self {
        Self {
            id,
            state: CustomerState::Walking,
            client,
            timer: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CustomerState {
        self.state
    }

    /// Move to `next` if that is a legal transition.
    pub fn advance(&mut self, next: CustomerState) -> bool {
        if self.state.can_become(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    /// Send a protocol message. A gone client is ignored.
    pub fn send(&self, message: &str) {
        if let Some(client) = &self.client {
            let _ = client.send(message.to_string());
        }
    }

    /// Enter the terminal state: tell the client how, stop the pending timer
    /// and count it.
    pub fn finish(&mut self, kind: SatisfyKind) {
        self.advance(CustomerState::Satisfied);
        self.timer = None;
        self.send(kind.code());
        CustomerMetrics::record_satisfied(kind.label());
    }

    fn rebind(&mut self, client: ClientSender) {
        self.client = Some(client);
    }

    /// Replace the armed timer; the previous one is cancelled.
    fn arm(&mut self, timer: Deferred) {
        self.timer = Some(timer);
    }
}

impl Serialize for Customer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Customer", 1)?;
        state.serialize_field("state", &(self.state as u8))?;
        state.end()
    }
}

impl Engine<'_> {
    /// Queue a new customer at retailer `retailer_index`.
    ///
    /// Returns the session id, or `None` while disabled or for an unknown index.
    pub fn join(&mut self, retailer_index: usize, client: Option<ClientSender>) -> Option<String> {
        if self.market.disabled || retailer_index >= self.market.retailers.len() {
            return None;
        }

        let id = uuid::Uuid::new_v4().to_string();
        let mut customer = Customer::new(id.clone(), client);
        customer.send(&format!("i{id}"));

        let walked = id.clone();
        customer.arm(self.defer(self.timings().walk_delay, move |engine| {
            engine.finish_walk(&walked);
        }));

        let retailer = &mut self.market.retailers[retailer_index];
        retailer.customers.push_back(customer);
        info!(customer = %id, retailer = %retailer.name, "Customer joined");
        self.notify(&Notice::Customer { r: retailer_index });
        Some(id)
    }

    /// Walk finished: get in line, and start ordering if already at the front.
    pub fn finish_walk(&mut self, customer_id: &str) {
        let Some((ri, ci)) = self.market.locate(customer_id) else {
            return;
        };
        let customer = &mut self.market.retailers[ri].customers[ci];
        if customer.advance(CustomerState::Inline) && ci == 0 {
            self.begin_ordering(ri);
        }
    }

    /// Front customer of retailer `ri` starts ordering.
    fn begin_ordering(&mut self, ri: usize) {
        let order_timeout = self.timings().order_timeout;
        let Some(front) = self.market.retailers[ri].customers.front() else {
            return;
        };
        if front.state() != CustomerState::Inline {
            return;
        }
        let id = front.id.clone();
        let timer = self.defer(order_timeout, move |engine| {
            engine.order_timeout(&id);
        });

        if let Some(front) = self.market.retailers[ri].customers.front_mut() {
            front.advance(CustomerState::Ordering);
            front.send("o");
            front.arm(timer);
            debug!(customer = %front.id, "Customer ordering");
        }
    }

    /// Order deadline passed.
    pub fn order_timeout(&mut self, customer_id: &str) {
        if self.market.customer(customer_id).map(Customer::state) == Some(CustomerState::Ordering) {
            self.satisfy(customer_id, SatisfyKind::Forced);
        }
    }

    /// Fulfillment deadline passed.
    pub fn fulfillment_timeout(&mut self, customer_id: &str) {
        if self.market.customer(customer_id).map(Customer::state) == Some(CustomerState::Ordered) {
            self.satisfy(customer_id, SatisfyKind::Forced);
        }
    }

    /// The client picked a size. Releases the order to its retailer.
    pub fn submit_order(&mut self, customer_id: &str, size: Size) -> bool {
        let fulfillment_timeout = self.timings().fulfillment_timeout;
        let Some((ri, ci)) = self.market.locate(customer_id) else {
            return false;
        };
        let retailer = &mut self.market.retailers[ri];
        let provider = retailer.name.clone();
        let customer = &mut retailer.customers[ci];
        if customer.state() != CustomerState::Ordering {
            return false;
        }
        customer.advance(CustomerState::Ordered);

        let subject = format!("Customer.{customer_id}");
        self.publish(
            CloudEvent::new(types::ORDER_RELEASED, "Passenger")
                .with_subject(subject.clone())
                .with_data(json!({
                    "provider": provider,
                    "orderStatus": "OrderReleased",
                    "customer": subject,
                    "offer": size.as_str(),
                })),
        );

        let id = customer_id.to_string();
        let timer = self.defer(fulfillment_timeout, move |engine| {
            engine.fulfillment_timeout(&id);
        });
        if let Some(customer) = self.market.customer_mut(customer_id) {
            customer.arm(timer);
        }
        info!(customer = %customer_id, retailer = %provider, offer = size.as_str(), "Order released");
        true
    }

    /// Terminal transition. Dequeues the customer and promotes the next one.
    ///
    /// Returns `false` when the customer is no longer queued anywhere.
    pub fn satisfy(&mut self, customer_id: &str, kind: SatisfyKind) -> bool {
        let Some((ri, ci)) = self.market.locate(customer_id) else {
            return false;
        };
        let Some(mut customer) = self.market.retailers[ri].customers.remove(ci) else {
            return false;
        };
        customer.finish(kind);
        drop(customer);

        info!(customer = %customer_id, kind = kind.label(), "Customer satisfied");
        self.notify(&Notice::Satisfied { r: ri, c: ci });

        if ci == 0 && kind != SatisfyKind::Closed {
            self.begin_ordering(ri);
        }
        true
    }

    /// A retailer delivered to `subject`; satisfies its front customer if it matches.
    pub fn deliver(&mut self, retailer_index: usize, subject: &str) {
        let Some(front) = self.market.retailers[retailer_index].customers.front() else {
            return;
        };
        if front.state() == CustomerState::Ordered
            && subject.strip_prefix("Customer.") == Some(front.id.as_str())
        {
            let id = front.id.clone();
            self.satisfy(&id, SatisfyKind::Ok);
        }
    }

    /// Close every queued customer, front first.
    pub fn close_all(&mut self) {
        for ri in 0..self.market.retailers.len() {
            while let Some(id) = self.market.retailers[ri].customers.front().map(|c| c.id.clone()) {
                self.satisfy(&id, SatisfyKind::Closed);
            }
        }
    }

    /// Rebind a live connection to an existing customer and repeat its prompt.
    pub fn rejoin(&mut self, customer_id: &str, client: ClientSender) -> bool {
        let Some(customer) = self.market.customer_mut(customer_id) else {
            return false;
        };
        customer.rebind(client);
        match customer.state() {
            CustomerState::Ordering => customer.send("o"),
            CustomerState::Ordered => customer.send("w"),
            _ => {}
        }
        debug!(customer = %customer_id, "Customer rejoined");
        true
    }

    /// Toggle the administrative disable. Disabling closes every customer.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.market.disabled = disabled;
        if disabled {
            self.close_all();
        }
        info!(disabled, "Customer joins toggled");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn transitions_are_forward_only() {
        use CustomerState::*;
        assert!(Walking.can_become(Inline));
        assert!(Inline.can_become(Ordering));
        assert!(Ordering.can_become(Ordered));
        assert!(Ordered.can_become(Satisfied));
        assert!(Walking.can_become(Satisfied));

        assert!(!Walking.can_become(Ordering));
        assert!(!Ordered.can_become(Inline));
        assert!(!Satisfied.can_become(Satisfied));
        assert!(!Satisfied.can_become(Walking));
    }

    #[test]
    fn customer_serializes_state_as_number() {
        let mut customer = Customer::new("c1".into(), None);
        customer.advance(CustomerState::Inline);
        assert_eq!(
            serde_json::to_string(&customer).unwrap(),
            r#"{"state":1}"#
        );
    }

    #[test]
    fn send_reaches_bound_client() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut customer = Customer::new("c1".into(), None);
        customer.send("o");
        customer.rebind(tx);
        customer.send("w");
        assert_eq!(rx.try_recv().unwrap(), "w");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn finish_closes_and_counts() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut customer = Customer::new("c1".into(), Some(tx));
        customer.advance(CustomerState::Inline);

        metrics::with_local_recorder(&recorder, || customer.finish(SatisfyKind::Closed));

        assert_eq!(customer.state(), CustomerState::Satisfied);
        assert_eq!(rx.try_recv().unwrap(), "c");
        assert!(
            handle
                .render()
                .contains(r#"concourse_customers_satisfied_total{kind="closed"} 1"#)
        );
    }

    #[test]
    fn satisfy_codes() {
        assert_eq!(SatisfyKind::Ok.code(), "s");
        assert_eq!(SatisfyKind::Forced.code(), "f");
        assert_eq!(SatisfyKind::Closed.code(), "c");
    }
}
