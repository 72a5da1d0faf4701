//! Expectation watchdog.
//!
//! Some events in the choreography demand a follow-up from a specific
//! participant. The watchdog keeps a static table of those patterns. When an
//! inbound event matches one, the participant expected to answer is resolved
//! right away and a timer is armed under the event's id. A later event whose
//! `cause` names that id cancels the expectation. If the timer fires first,
//! the unresponsive participant is disconnected and, for patterns that ask
//! for it, the original message is republished verbatim so someone else can
//! pick it up.

use crate::engine::Engine;
use crate::registry::Marketplace;
use concourse_core::{BusMessage, CloudEvent, Role, Source, types};
use concourse_runtime::Deferred;
use concourse_runtime::metrics::WatchdogMetrics;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Who is expected to answer a watched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// The retailer named by the payload's `provider`
    Provider,
    /// The supplier holding a job for the retailer that sent the event
    HandlingSupplier,
    /// The retailer named by the payload's `toLocation`
    HandlingRetailer,
    /// The carrier holding the (`toLocation`, `fromLocation`) route
    HandlingCarrier,
}

impl Selector {
    /// Resolve to a registered `(role, name)`, or `None` if nobody qualifies.
    #[must_use]
    pub fn resolve(
        self,
        market: &Marketplace,
        source: &str,
        data: &Map<String, Value>,
    ) -> Option<(Role, String)> {
        let field = |name: &str| data.get(name).and_then(Value::as_str);
        match self {
            Self::Provider => {
                let retailer = market.retailer(field("provider")?)?;
                Some((Role::Retailer, retailer.name.clone()))
            }
            Self::HandlingSupplier => {
                market.retailer(source)?;
                let supplier = market.handling_supplier(source)?;
                Some((Role::Supplier, supplier.name.clone()))
            }
            Self::HandlingRetailer => {
                let retailer = market.retailer(field("toLocation")?)?;
                Some((Role::Retailer, retailer.name.clone()))
            }
            Self::HandlingCarrier => {
                let retailer = market.retailer(field("toLocation")?)?;
                let supplier = market.supplier(field("fromLocation")?)?;
                let carrier = market.handling_carrier(&retailer.name, &supplier.name)?;
                Some((Role::Carrier, carrier.name.clone()))
            }
        }
    }
}

/// One watched event shape.
#[derive(Debug)]
pub struct Pattern {
    /// Event type
    pub event_type: &'static str,
    /// Role of the event's source
    pub role: Role,
    /// Payload field that must be present...
    pub field: &'static str,
    /// ...with this string value
    pub value: &'static str,
    /// Participant expected to answer
    pub selector: Selector,
    /// Republish the original message on expiry
    pub resend: bool,
}

impl Pattern {
    /// Whether an event of `event_type` from `role` with `data` is watched by this pattern.
    #[must_use]
    pub fn matches(&self, event_type: &str, role: Role, data: &Map<String, Value>) -> bool {
        self.event_type == event_type
            && self.role == role
            && data.get(self.field).and_then(Value::as_str) == Some(self.value)
    }
}

/// The choreography's watched events.
pub const PATTERNS: [Pattern; 5] = [
    // Customer order: the retailer must pass it on.
    Pattern {
        event_type: types::ORDER_RELEASED,
        role: Role::Passenger,
        field: "orderStatus",
        value: "OrderReleased",
        selector: Selector::Provider,
        resend: false,
    },
    // Retailer order: its supplier must ask for transport.
    Pattern {
        event_type: types::ORDER_RELEASED,
        role: Role::Retailer,
        field: "orderStatus",
        value: "OrderReleased",
        selector: Selector::HandlingSupplier,
        resend: true,
    },
    // Transport request: the route's carrier must pick it up.
    Pattern {
        event_type: types::TRANSFER_POTENTIAL,
        role: Role::Supplier,
        field: "actionStatus",
        value: "PotentialActionStatus",
        selector: Selector::HandlingCarrier,
        resend: true,
    },
    // Simulated arrival: the carrier must complete.
    Pattern {
        event_type: types::TRANSFER_ARRIVED,
        role: Role::Controller,
        field: "actionStatus",
        value: "ArrivedActionStatus",
        selector: Selector::HandlingCarrier,
        resend: true,
    },
    // Completed transfer: the retailer must deliver.
    Pattern {
        event_type: types::TRANSFER_COMPLETED,
        role: Role::Carrier,
        field: "actionStatus",
        value: "CompletedActionStatus",
        selector: Selector::HandlingRetailer,
        resend: false,
    },
];

#[derive(Debug)]
struct Armed {
    token: u64,
    role: Role,
    participant: String,
    resend: bool,
    _timer: Deferred,
}

#[derive(Debug)]
struct Pending {
    message: BusMessage,
    armed: Vec<Armed>,
}

/// Pending expectations keyed by the id of the event that armed them.
#[derive(Debug, Default)]
pub struct Watchdog {
    pending: HashMap<String, Pending>,
    next_token: u64,
}

impl Watchdog {
    /// Whether an expectation is pending for `event_id`.
    #[must_use]
    pub fn is_pending(&self, event_id: &str) -> bool {
        self.pending.contains_key(event_id)
    }
}

impl Engine<'_> {
    /// Run the watchdog over one inbound event: resolve by cause, then arm.
    pub fn observe(&mut self, event: &CloudEvent, message: &BusMessage) {
        if let Some(cause) = event.cause() {
            if self.market.watchdog.pending.remove(cause).is_some() {
                WatchdogMetrics::record_resolved();
                debug!(event_id = %cause, response = %event.id, "Expectation resolved");
            }
        }
        self.arm_expectations(event, message);
    }

    fn arm_expectations(&mut self, event: &CloudEvent, message: &BusMessage) {
        if event.source.is_empty()
            || event.id.is_empty()
            || self.market.watchdog.is_pending(&event.id)
        {
            return;
        }
        let Some(data) = event.data_object() else {
            return;
        };

        let role = Source::parse(&event.source).role;
        let timeout = self.timings().expectation_timeout;
        let mut armed = Vec::new();

        for pattern in PATTERNS
            .iter()
            .filter(|p| p.matches(&event.event_type, role, data))
        {
            let Some((target, participant)) =
                pattern.selector.resolve(&*self.market, &event.source, data)
            else {
                continue;
            };

            self.market.watchdog.next_token += 1;
            let token = self.market.watchdog.next_token;
            let event_id = event.id.clone();
            let timer = self.defer(timeout, move |engine| engine.expire(&event_id, token));

            WatchdogMetrics::record_armed();
            debug!(event_id = %event.id, %participant, "Expectation armed");
            armed.push(Armed {
                token,
                role: target,
                participant,
                resend: pattern.resend,
                _timer: timer,
            });
        }

        if !armed.is_empty() {
            self.market.watchdog.pending.insert(
                event.id.clone(),
                Pending {
                    message: message.clone(),
                    armed,
                },
            );
        }
    }

    /// Timer callback. A no-op if the expectation was resolved in the meantime.
    pub fn expire(&mut self, event_id: &str, token: u64) {
        let watchdog = &mut self.market.watchdog;
        let Some(pending) = watchdog.pending.get_mut(event_id) else {
            return;
        };
        let Some(position) = pending.armed.iter().position(|a| a.token == token) else {
            return;
        };
        let armed = pending.armed.remove(position);
        let message = pending.message.clone();
        if pending.armed.is_empty() {
            watchdog.pending.remove(event_id);
        }

        WatchdogMetrics::record_expired();
        warn!(
            %event_id,
            participant = %armed.participant,
            resend = armed.resend,
            "Expectation expired, disconnecting participant"
        );
        self.disconnect(armed.role, &armed.participant);
        if armed.resend {
            self.ctl.outbox().resend(message);
        }
    }

    /// Drop every pending expectation, cancelling its timers.
    pub fn clear_expectations(&mut self) {
        self.market.watchdog.pending.clear();
    }
}
