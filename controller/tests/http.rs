//! HTTP routes of the controller.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::Harness;
use concourse_controller::server::{AppState, build_router};
use serde_json::{Value, json};

fn server(h: &Harness) -> TestServer {
    TestServer::new(build_router(AppState::new(h.controller.clone(), None))).unwrap()
}

#[tokio::test]
async fn data_serves_the_registry_snapshot() {
    let mut h = Harness::new();
    h.small_marketplace().await;
    let server = server(&h);

    let response = server.get("/data").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["disabled"], false);
    assert_eq!(body["retailers"][0]["name"], "North");
    assert_eq!(body["retailers"][0]["logo"], "n.png");
    assert_eq!(body["suppliers"][0]["name"], "Supplier.acme");
    assert_eq!(body["carriers"][0]["jobs"][0]["fromLocation"], "Supplier.acme");
}

#[tokio::test]
async fn data_of_an_empty_marketplace() {
    let h = Harness::new();
    let server = server(&h);

    let body: Value = server.get("/data").await.json();
    assert_eq!(
        body,
        json!({ "disabled": false, "suppliers": [], "retailers": [], "carriers": [] })
    );
}

#[tokio::test]
async fn health_is_ok() {
    let h = Harness::new();
    let response = server(&h).get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn metrics_without_recorder_is_unavailable() {
    let h = Harness::new();
    let response = server(&h).get("/metrics").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let h = Harness::new();
    let response = server(&h).get("/nope").await;
    response.assert_status_not_found();
}
