//! Inbound event dispatch.
//!
//! One bus event is processed end to end under the write lock: mirrored to the
//! dashboard, run through the watchdog, then routed by the role encoded in its
//! source.

use crate::engine::{Announcement, Engine};
use crate::notice::Notice;
use crate::registry::Size;
use concourse_core::{BusMessage, CONTROLLER_SOURCE, CloudEvent, Role, Source, types};
use concourse_runtime::Deferred;
use concourse_runtime::metrics::EngineMetrics;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct OrderUpdate {
    #[serde(rename = "orderStatus")]
    order_status: String,
    #[serde(default)]
    offer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferUpdate {
    action_status: String,
    #[serde(default)]
    from_location: String,
    #[serde(default)]
    to_location: String,
    #[serde(default)]
    offer: String,
}

fn kind(event_type: &str) -> &'static str {
    match event_type {
        types::CONNECTION => "connection",
        types::DISCONNECT => "disconnect",
        types::RESET => "reset",
        types::ORDER | types::ORDER_RELEASED | types::ORDER_DELIVERED => "order",
        t if t.starts_with("TransferAction.") => "transfer",
        types::OFFER_PRODUCT | types::OFFER_TRANSPORT => "offer",
        _ => "other",
    }
}

fn malformed(event: &CloudEvent, error: &dyn std::fmt::Display) {
    EngineMetrics::record_malformed();
    warn!(event_id = %event.id, source = %event.source, %error, "Malformed event payload, skipping");
}

impl Engine<'_> {
    /// Process one decoded inbound event. `message` is the raw form it arrived in.
    pub fn dispatch(&mut self, event: &CloudEvent, message: &BusMessage) {
        let source = Source::parse(&event.source);
        EngineMetrics::record_event(kind(&event.event_type));
        debug!(event_id = %event.id, source = %event.source, event_type = %event.event_type, "Dispatching event");

        if source.role != Role::Controller {
            if source.role != Role::Truck {
                self.notify(&Notice::Event { event });
            }
            if event.event_type == types::RESET {
                self.reset();
            }
        }

        self.observe(event, message);

        if !source.is_instance() {
            return;
        }
        match (source.role, event.event_type.as_str()) {
            (Role::Supplier | Role::Retailer | Role::Carrier, types::CONNECTION) => {
                self.on_connection(source.role, source.name, event);
            }
            (Role::Supplier | Role::Retailer | Role::Carrier, types::DISCONNECT) => {
                self.disconnect(source.role, source.name);
            }
            (Role::Retailer, types::ORDER | types::ORDER_RELEASED | types::ORDER_DELIVERED) => {
                self.on_retailer_order(source.name, event);
            }
            (Role::Carrier, types::TRANSFER_ACTIVE | types::TRANSFER_COMPLETED) => {
                self.on_transfer(source.name, event);
            }
            _ => {}
        }
    }

    fn on_connection(&mut self, role: Role, name: &str, event: &CloudEvent) {
        let announcement = if event.data.is_none() {
            Announcement::default()
        } else {
            match event.data_as::<Announcement>() {
                Ok(announcement) => announcement,
                Err(e) if !self.market.contains(role, name) => return malformed(event, &e),
                Err(_) => Announcement::default(),
            }
        };
        self.connect(role, name, &announcement);
    }

    fn on_retailer_order(&mut self, retailer: &str, event: &CloudEvent) {
        let Some(index) = self.market.index_of(Role::Retailer, retailer) else {
            return;
        };
        let update = match event.data_as::<OrderUpdate>() {
            Ok(update) => update,
            Err(e) => return malformed(event, &e),
        };

        match update.order_status.as_str() {
            "OrderReleased" => match Size::parse(&update.offer) {
                Some(size) => self.notify(&Notice::offer(size, index, false)),
                None => malformed(event, &format!("unknown offer {:?}", update.offer)),
            },
            "OrderDelivered" => self.deliver(index, event.subject()),
            _ => {}
        }
    }

    fn on_transfer(&mut self, carrier: &str, event: &CloudEvent) {
        let update = match event.data_as::<TransferUpdate>() {
            Ok(update) => update,
            Err(e) => return malformed(event, &e),
        };

        match update.action_status.as_str() {
            "ActiveActionStatus" => {
                let (Some(c), Some(s), Some(r)) = (
                    self.market.index_of(Role::Carrier, carrier),
                    self.market.index_of(Role::Supplier, &update.from_location),
                    self.market.index_of(Role::Retailer, &update.to_location),
                ) else {
                    return;
                };
                self.notify(&Notice::GoCarrier { c, s, r });
                self.schedule_arrival(event, update);
            }
            "CompletedActionStatus" => {
                let Some(r) = self.market.index_of(Role::Retailer, &update.to_location) else {
                    return;
                };
                match Size::parse(&update.offer) {
                    Some(size) => self.notify(&Notice::offer(size, r, true)),
                    None => malformed(event, &format!("unknown offer {:?}", update.offer)),
                }
            }
            _ => {}
        }
    }

    /// Publish the simulated arrival once the transit delay has passed.
    fn schedule_arrival(&mut self, active: &CloudEvent, mut update: TransferUpdate) {
        update.action_status = "ArrivedActionStatus".to_string();
        let mut arrived = CloudEvent::new(types::TRANSFER_ARRIVED, CONTROLLER_SOURCE)
            .with_cause(active.id.clone())
            .with_data(json!(update));
        if let Some(subject) = &active.subject {
            arrived = arrived.with_subject(subject.clone());
        }

        let outbox = self.ctl.outbox().clone();
        let transit = Deferred::spawn(self.timings().transit_delay, async move {
            outbox.publish(arrived);
        });
        self.market.transits.retain(|t| !t.is_finished());
        self.market.transits.push(transit);
    }
}
