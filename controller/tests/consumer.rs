//! Bus consumer subscribe/reconnect loop against the in-memory bus.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::Harness;
use concourse_controller::BusConsumer;
use concourse_core::{EventBus, types};
use concourse_runtime::RetryPolicy;
use concourse_testing::{InMemoryEventBus, fixtures};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const TOPIC: &str = "concourse";

fn policy() -> RetryPolicy {
    RetryPolicy::forever(Duration::from_millis(10), Duration::from_millis(100))
}

/// Yield until `condition` holds, letting paused time run.
async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(condition(), "condition not reached");
}

#[tokio::test(start_paused = true)]
async fn subscribes_announces_reset_and_processes() {
    let mut h = Harness::new();
    let bus = InMemoryEventBus::new();
    let (shutdown, rx) = broadcast::channel(1);
    let task = BusConsumer::new(h.controller.clone(), Arc::new(bus.clone()), TOPIC, policy(), rx).spawn();

    eventually(|| bus.subscriber_count() == 1).await;
    let resets: Vec<_> = h
        .published()
        .into_iter()
        .filter(|e| e.event_type == types::RESET)
        .collect();
    assert_eq!(resets.len(), 1);

    bus.publish(TOPIC, &fixtures::connection("Supplier.acme", "a.png").to_message())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(h.snapshot().await["suppliers"][0]["name"], "Supplier.acme");

    shutdown.send(()).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn reconnects_and_reannounces_after_stream_ends() {
    let mut h = Harness::new();
    let bus = InMemoryEventBus::new();
    let (shutdown, rx) = broadcast::channel(1);
    let task = BusConsumer::new(h.controller.clone(), Arc::new(bus.clone()), TOPIC, policy(), rx).spawn();
    eventually(|| bus.subscriber_count() == 1).await;
    h.outbound();

    bus.fail_next_subscribes(2);
    bus.drop_subscriptions();
    eventually(|| bus.subscriber_count() == 1).await;

    let published = h.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].event_type, types::RESET);

    shutdown.send(()).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_retrying_stops_the_consumer() {
    let h = Harness::new();
    let bus = InMemoryEventBus::new();
    bus.fail_next_subscribes(usize::MAX);
    let (shutdown, rx) = broadcast::channel(1);
    let task = BusConsumer::new(h.controller.clone(), Arc::new(bus.clone()), TOPIC, policy(), rx).spawn();

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.send(()).unwrap();
    task.await.unwrap();
    assert_eq!(bus.subscriber_count(), 0);
}
