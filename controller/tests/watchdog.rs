//! Expectation watchdog across the order choreography.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{Harness, advance};
use concourse_controller::{Outbound, Timings};
use concourse_core::{CONTROLLER_SOURCE, types};
use concourse_testing::fixtures;
use serde_json::json;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

fn disconnected(published: &[Outbound]) -> Vec<String> {
    published
        .iter()
        .filter_map(|item| match item {
            Outbound::Event(e) if e.event_type == types::DISCONNECT => Some(e.subject().to_string()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn correlated_response_cancels_expectation() {
    let mut h = Harness::new();
    h.small_marketplace().await;

    let order = fixtures::retailer_order_released("Retailer.north", "c1", "small");
    h.deliver(&order).await;
    let potential = fixtures::transfer("Supplier.acme", "Potential", "Supplier.acme", "Retailer.north", "small")
        .with_cause(order.id.clone());
    h.deliver(&potential).await;
    let active = fixtures::transfer("Carrier.van", "Active", "Supplier.acme", "Retailer.north", "small")
        .with_cause(potential.id.clone());
    h.deliver(&active).await;

    advance(TIMEOUT * 2).await;

    assert!(disconnected(&h.outbound()).is_empty());
    let snapshot = h.snapshot().await;
    assert_eq!(snapshot["suppliers"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["carriers"].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cause_cancels_only_the_expectation_it_names() {
    let mut h = Harness::new();
    h.deliver(&fixtures::retailer_connection("Retailer.north", "North", "n.png"))
        .await;
    h.deliver(&fixtures::retailer_connection("Retailer.south", "South", "s.png"))
        .await;
    h.deliver(&fixtures::connection("Supplier.acme", "a.png")).await;
    h.deliver(&fixtures::connection("Supplier.bolt", "b.png")).await;
    h.outbound();

    // acme serves north, bolt serves south.
    let north = fixtures::retailer_order_released("Retailer.north", "c1", "small");
    let south = fixtures::retailer_order_released("Retailer.south", "c2", "small");
    h.deliver(&north).await;
    h.deliver(&south).await;

    let potential = fixtures::transfer("Supplier.acme", "Potential", "Supplier.acme", "Retailer.north", "small")
        .with_cause(north.id.clone());
    h.deliver(&potential).await;

    advance(TIMEOUT).await;
    assert_eq!(disconnected(&h.outbound()), ["Supplier.bolt"]);

    advance(TIMEOUT).await;
    assert!(disconnected(&h.outbound()).is_empty());
    let suppliers = h.snapshot().await["suppliers"].clone();
    assert_eq!(suppliers.as_array().unwrap().len(), 1);
    assert_eq!(suppliers[0]["name"], "Supplier.acme");
}

#[tokio::test(start_paused = true)]
async fn expired_expectation_disconnects_and_resends_verbatim() {
    let mut h = Harness::new();
    h.small_marketplace().await;

    let order = fixtures::retailer_order_released("Retailer.north", "c1", "small");
    let original = order.to_message();
    h.deliver_raw(&original).await;

    tokio::time::sleep(TIMEOUT - Duration::from_millis(1)).await;
    assert!(h.outbound().is_empty());

    advance(Duration::from_millis(1)).await;
    let outbound = h.outbound();
    assert_eq!(disconnected(&outbound), ["Supplier.acme"]);
    let resent: Vec<_> = outbound
        .iter()
        .filter(|item| matches!(item, Outbound::Resend(_)))
        .collect();
    assert_eq!(resent.len(), 1);
    assert_eq!(resent[0].to_message(), original);

    assert_eq!(h.notices_of("rmsupplier"), [json!({ "type": "rmsupplier", "s": 0 })]);
    assert!(h.snapshot().await["suppliers"].as_array().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn redelivered_event_does_not_rearm() {
    let mut h = Harness::new();
    h.small_marketplace().await;

    let order = fixtures::retailer_order_released("Retailer.north", "c1", "small");
    h.deliver(&order).await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    h.deliver(&order).await;

    advance(Duration::from_secs(4)).await;
    assert_eq!(disconnected(&h.outbound()), ["Supplier.acme"]);

    advance(TIMEOUT).await;
    assert!(disconnected(&h.outbound()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn unresolvable_participant_arms_nothing() {
    let mut h = Harness::new();
    h.deliver(&fixtures::retailer_connection("Retailer.north", "North", "n.png"))
        .await;
    h.outbound();

    h.deliver(&fixtures::retailer_order_released("Retailer.north", "c1", "small"))
        .await;
    advance(TIMEOUT).await;

    assert!(h.outbound().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reset_drops_pending_expectations() {
    let mut h = Harness::new();
    h.small_marketplace().await;
    h.deliver(&fixtures::retailer_order_released("Retailer.north", "c1", "small"))
        .await;

    h.deliver(&fixtures::reset("Carrier.van")).await;
    h.outbound();

    advance(TIMEOUT).await;
    assert!(h.outbound().is_empty());
}

#[tokio::test(start_paused = true)]
async fn silent_retailer_is_evicted_without_resend() {
    let mut h = Harness::with_timings(Timings {
        expectation_timeout: Duration::from_secs(5),
        ..Timings::default()
    });
    h.small_marketplace().await;
    let mut customer = h.join(0).await;
    advance(Duration::from_secs(2)).await;
    customer.all();

    h.controller.submit_order(&customer.id, 0).await;
    let released = h.published().remove(0);
    h.deliver(&released).await;

    advance(Duration::from_secs(5)).await;
    let outbound = h.outbound();
    assert_eq!(disconnected(&outbound), ["Retailer.north"]);
    assert!(!outbound.iter().any(|item| matches!(item, Outbound::Resend(_))));
    assert_eq!(customer.all(), ["c"]);
}

#[tokio::test(start_paused = true)]
async fn full_choreography_completes_without_evictions() {
    let mut h = Harness::new();
    h.small_marketplace().await;
    let mut customer = h.join(0).await;
    advance(Duration::from_secs(2)).await;
    customer.all();

    // Passenger → retailer
    h.controller.submit_order(&customer.id, 1).await;
    let released = h.published().remove(0);
    h.deliver(&released).await;

    // Retailer → supplier
    let order = fixtures::retailer_order_released("Retailer.north", &customer.id, "medium")
        .with_cause(released.id.clone());
    h.deliver(&order).await;

    // Supplier → carrier
    let potential = fixtures::transfer("Supplier.acme", "Potential", "Supplier.acme", "Retailer.north", "medium")
        .with_cause(order.id.clone());
    h.deliver(&potential).await;

    // Carrier picks up; the controller simulates transit.
    let active = fixtures::transfer("Carrier.van", "Active", "Supplier.acme", "Retailer.north", "medium")
        .with_cause(potential.id.clone());
    h.deliver(&active).await;
    assert_eq!(
        h.notices_of("gocarrier"),
        [json!({ "type": "gocarrier", "c": 0, "s": 0, "r": 0 })]
    );

    advance(Duration::from_secs(4)).await;
    let arrived = h
        .published()
        .into_iter()
        .find(|e| e.event_type == types::TRANSFER_ARRIVED)
        .unwrap();
    assert_eq!(arrived.source, CONTROLLER_SOURCE);
    assert_eq!(arrived.cause(), Some(active.id.as_str()));
    assert_eq!(arrived.subject(), active.subject());
    assert_eq!(
        arrived.data,
        Some(json!({
            "actionStatus": "ArrivedActionStatus",
            "fromLocation": "Supplier.acme",
            "toLocation": "Retailer.north",
            "offer": "medium",
        }))
    );
    h.deliver(&arrived).await;

    // Carrier → retailer → customer
    let completed = fixtures::transfer("Carrier.van", "Completed", "Supplier.acme", "Retailer.north", "medium")
        .with_cause(arrived.id.clone());
    h.deliver(&completed).await;
    let delivered = fixtures::order_delivered("Retailer.north", &customer.id, "medium")
        .with_cause(completed.id.clone());
    h.deliver(&delivered).await;
    assert_eq!(customer.all(), ["s"]);

    advance(TIMEOUT * 2).await;
    assert!(disconnected(&h.outbound()).is_empty());
    let snapshot = h.snapshot().await;
    assert_eq!(snapshot["retailers"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["suppliers"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["carriers"].as_array().unwrap().len(), 1);
}
