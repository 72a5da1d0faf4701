//! Builders for participant events.
//!
//! Each builder returns a fully stamped [`CloudEvent`] (spec version, fresh id,
//! time) the way a participant would publish it. Override the id with
//! [`CloudEvent::with_id`] when a test needs to correlate on it.

use concourse_core::{CloudEvent, types};
use serde_json::json;

/// `Connection` from a supplier or carrier.
#[must_use]
pub fn connection(source: &str, logo: &str) -> CloudEvent {
    CloudEvent::new(types::CONNECTION, source)
        .with_data(json!({ "logo": logo }))
        .with_defaults()
}

/// `Connection` from a retailer, which also announces its organization.
#[must_use]
pub fn retailer_connection(source: &str, organization: &str, logo: &str) -> CloudEvent {
    CloudEvent::new(types::CONNECTION, source)
        .with_data(json!({ "organization": organization, "logo": logo }))
        .with_defaults()
}

/// `Disconnect` announced by a participant.
#[must_use]
pub fn disconnect(source: &str) -> CloudEvent {
    CloudEvent::new(types::DISCONNECT, source).with_defaults()
}

/// `Reset` requested by a participant.
#[must_use]
pub fn reset(source: &str) -> CloudEvent {
    CloudEvent::new(types::RESET, source).with_defaults()
}

/// Order released by a passenger to its retailer.
#[must_use]
pub fn passenger_order(customer_id: &str, provider: &str, offer: &str) -> CloudEvent {
    let customer = format!("Customer.{customer_id}");
    CloudEvent::new(types::ORDER_RELEASED, "Passenger")
        .with_subject(customer.clone())
        .with_data(json!({
            "provider": provider,
            "orderStatus": "OrderReleased",
            "customer": customer,
            "offer": offer,
        }))
        .with_defaults()
}

/// Order released by a retailer to its supplier.
#[must_use]
pub fn retailer_order_released(retailer: &str, customer_id: &str, offer: &str) -> CloudEvent {
    CloudEvent::new(types::ORDER_RELEASED, retailer)
        .with_subject(format!("Customer.{customer_id}"))
        .with_data(json!({ "orderStatus": "OrderReleased", "offer": offer }))
        .with_defaults()
}

/// Order handed to the customer by its retailer.
#[must_use]
pub fn order_delivered(retailer: &str, customer_id: &str, offer: &str) -> CloudEvent {
    CloudEvent::new(types::ORDER_DELIVERED, retailer)
        .with_subject(format!("Customer.{customer_id}"))
        .with_data(json!({ "orderStatus": "OrderDelivered", "offer": offer }))
        .with_defaults()
}

/// Transfer action with the given status suffix (`Potential`, `Active`, `Completed`).
#[must_use]
pub fn transfer(
    source: &str,
    status: &str,
    from_location: &str,
    to_location: &str,
    offer: &str,
) -> CloudEvent {
    CloudEvent::new(format!("TransferAction.ActionStatus.{status}ActionStatus"), source)
        .with_subject(format!("Transfer.{from_location}.{to_location}"))
        .with_data(json!({
            "actionStatus": format!("{status}ActionStatus"),
            "fromLocation": from_location,
            "toLocation": to_location,
            "offer": offer,
        }))
        .with_defaults()
}
