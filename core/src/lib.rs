//! # Concourse Core
//!
//! Core types shared by every Concourse crate.
//!
//! The controller talks to marketplace participants (suppliers, retailers,
//! carriers, passengers) exclusively through a publish/subscribe bus. This crate
//! owns the vocabulary of that conversation:
//!
//! - [`event::CloudEvent`]: the decoded bus envelope
//! - [`event::BusMessage`]: the raw transport message (headers + payload) that an
//!   envelope travels in, kept around so a message can be republished verbatim
//! - [`event_bus::EventBus`]: the transport abstraction
//! - [`source::Source`] / [`source::Role`]: the tagged decoding of an event's
//!   `source` attribute
//!
//! ## Example
//!
//! ```
//! use concourse_core::event::{BusMessage, CloudEvent};
//! use concourse_core::source::{Role, Source};
//!
//! let event = CloudEvent::new("Connection", "Retailer.north")
//!     .with_data(serde_json::json!({ "organization": "North", "logo": "n.png" }));
//! let message: BusMessage = event.to_message();
//!
//! let decoded = CloudEvent::from_message(&message).unwrap();
//! assert_eq!(Source::parse(&decoded.source).role, Role::Retailer);
//! ```

pub mod event;
pub mod event_bus;
pub mod source;

pub use event::{BusMessage, CloudEvent, CloudEventError};
pub use event_bus::{EventBus, EventBusError, EventStream};
pub use source::{Role, Source};

/// Source attribute used by every controller-originated event.
pub const CONTROLLER_SOURCE: &str = "Controller";

/// Well-known event `type` attributes exchanged on the bus.
pub mod types {
    /// A participant announces itself.
    pub const CONNECTION: &str = "Connection";
    /// A participant leaves, or the controller evicts one.
    pub const DISCONNECT: &str = "Disconnect";
    /// Global resynchronisation.
    pub const RESET: &str = "Reset";
    /// Coarse order event type (subset variant, routed by `orderStatus`).
    pub const ORDER: &str = "Order";
    /// A customer (or retailer) released an order.
    pub const ORDER_RELEASED: &str = "Order.OrderStatus.OrderReleased";
    /// A retailer handed an order to its customer.
    pub const ORDER_DELIVERED: &str = "Order.OrderStatus.OrderDelivered";
    /// A supplier asks for transport.
    pub const TRANSFER_POTENTIAL: &str = "TransferAction.ActionStatus.PotentialActionStatus";
    /// A carrier started a transfer.
    pub const TRANSFER_ACTIVE: &str = "TransferAction.ActionStatus.ActiveActionStatus";
    /// The controller reports the simulated transit finished.
    pub const TRANSFER_ARRIVED: &str = "TransferAction.ActionStatus.ArrivedActionStatus";
    /// A carrier completed delivery to the retailer.
    pub const TRANSFER_COMPLETED: &str = "TransferAction.ActionStatus.CompletedActionStatus";
    /// Job list for a supplier.
    pub const OFFER_PRODUCT: &str = "Offer.Product";
    /// Job list for a carrier.
    pub const OFFER_TRANSPORT: &str = "Offer.Service.Transport";
}
