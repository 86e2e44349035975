//! Signed completion notifications.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{to_base_units, TestHarness};
use attentium_node::verify_signature;
use serde_json::{json, Value};

const CALLBACK: &str = "https://buyer.example.test/hooks/attentium";

fn request() -> Value {
    json!({
        "duration": 30,
        "quantity": 2,
        "bid_per_second": "0.05",
        "validation_question": "What colour is the car?",
        "callback_url": CALLBACK
    })
}

fn answer(campaign_id: &str, wallet: &str) -> Value {
    json!({
        "answer": "a red car",
        "actualDuration": 30,
        "exitedEarly": false,
        "bidId": campaign_id,
        "wallet": wallet
    })
}

#[tokio::test]
async fn test_accepted_responses_complete_campaign_and_notify() {
    let harness = TestHarness::setup().await;
    let created = harness.create_paid("camp-hook", "sigHook", &request()).await;
    let read_key = created["read_key"].as_str().unwrap();
    let secret = created["webhook_secret"].as_str().unwrap();

    assert_eq!(harness.complete("m-1", &answer("camp-hook", "WorkerA")).await.status, 200);
    assert_eq!(harness.complete("m-2", &answer("camp-hook", "WorkerB")).await.status, 200);

    let results = harness.results("camp-hook", Some(read_key)).await;
    assert_eq!(
        results.body,
        json!({ "status": "completed", "completed_quantity": 2, "target_quantity": 2 })
    );

    let sent = harness.transport.sent();
    assert_eq!(sent.len(), 2);
    for delivery in &sent {
        assert_eq!(delivery.url, CALLBACK);
        assert_eq!(delivery.header_name, "X-Attentium-Signature");
        assert!(verify_signature(secret, &delivery.body, &delivery.signature));
        assert!(!verify_signature(read_key, &delivery.body, &delivery.signature));
    }

    let first: Value = serde_json::from_slice(&sent[0].body).unwrap();
    assert_eq!(first["event"], "response.accepted");
    assert_eq!(first["campaign_id"], "camp-hook");
    assert_eq!(first["match_id"], "m-1");
    assert_eq!(first["wallet"], "WorkerA");
    assert_eq!(first["verified_seconds"], 30);
    assert_eq!(to_base_units(first["net_payout"].as_str().unwrap()), 1_350_000);
    assert_eq!(first["completed_quantity"], 1);
    assert_eq!(first["status"], "active");

    let last: Value = serde_json::from_slice(&sent[1].body).unwrap();
    assert_eq!(last["completed_quantity"], 2);
    assert_eq!(last["status"], "completed");
}

#[tokio::test]
async fn test_tampered_body_fails_verification() {
    let harness = TestHarness::setup().await;
    let created = harness.create_paid("camp-hook", "sigHook", &request()).await;
    let secret = created["webhook_secret"].as_str().unwrap();
    harness.complete("m-1", &answer("camp-hook", "WorkerA")).await;

    let delivery = harness.transport.sent().pop().unwrap();
    let mut tampered = delivery.body.to_vec();
    let at = tampered.len() / 2;
    tampered[at] ^= 0x01;
    assert!(!verify_signature(secret, &tampered, &delivery.signature));
}

#[tokio::test]
async fn test_delivery_failure_does_not_fail_submission() {
    let harness = TestHarness::setup().await;
    let created = harness.create_paid("camp-hook", "sigHook", &request()).await;
    let read_key = created["read_key"].as_str().unwrap();
    harness.transport.set_failing(true);

    let response = harness.complete("m-1", &answer("camp-hook", "WorkerA")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({ "success": true }));
    assert!(harness.transport.sent().is_empty());

    let results = harness.results("camp-hook", Some(read_key)).await;
    assert_eq!(results.body["completed_quantity"], 1);
}

#[tokio::test]
async fn test_completed_campaign_stops_counting() {
    let harness = TestHarness::setup().await;
    let mut body = request();
    body["quantity"] = json!(1);
    let created = harness.create_paid("camp-one", "sigOne", &body).await;
    let read_key = created["read_key"].as_str().unwrap();

    assert_eq!(harness.complete("m-1", &answer("camp-one", "WorkerA")).await.status, 200);
    let late = harness.complete("m-2", &answer("camp-one", "WorkerB")).await;
    assert_eq!(late.status, 200);
    assert_eq!(harness.quality("WorkerB").await, Some(51));

    let results = harness.results("camp-one", Some(read_key)).await;
    assert_eq!(
        results.body,
        json!({ "status": "completed", "completed_quantity": 1, "target_quantity": 1 })
    );
    assert_eq!(harness.transport.sent().len(), 1);
}

#[tokio::test]
async fn test_campaign_without_callback_sends_nothing() {
    let harness = TestHarness::setup().await;
    let mut body = request();
    body.as_object_mut().unwrap().remove("callback_url");
    harness.create_paid("camp-quiet", "sigQuiet", &body).await;

    assert_eq!(harness.complete("m-1", &answer("camp-quiet", "WorkerA")).await.status, 200);
    assert!(harness.transport.sent().is_empty());
}
