//! Worker reputation through `POST /v1/matches/{id}/complete`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::TestHarness;
use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Value};

const WORKER: &str = "Worker11111111111111111111111111111111111111";
const DAY_MS: i64 = 86_400_000;

fn answer(text: &str) -> Value {
    json!({
        "answer": text,
        "actualDuration": 30,
        "exitedEarly": false,
        "wallet": WORKER
    })
}

#[tokio::test]
async fn test_first_answers_move_quality() {
    let harness = TestHarness::setup().await;

    let accepted = harness.complete("m-1", &answer("a red car")).await;
    assert_eq!(accepted.status, 200);
    assert_eq!(accepted.body, json!({ "success": true }));
    assert_eq!(harness.quality(WORKER).await, Some(51));

    let other = "Worker22222222222222222222222222222222222222";
    let rejected = harness
        .complete("m-2", &json!({ "answer": "spam spam", "wallet": other }))
        .await;
    assert_eq!(rejected.status, 200);
    assert_eq!(rejected.body, json!({ "success": false, "status": "rejected" }));
    assert_eq!(harness.quality(other).await, Some(40));
}

#[tokio::test]
async fn test_missing_wallet_is_400() {
    let harness = TestHarness::setup().await;
    let response = harness
        .complete("m-1", &json!({ "answer": "a red car", "wallet": "  " }))
        .await;
    assert_eq!(response.status, 400);
    assert_eq!(harness.classifier.calls(), 0);
}

#[tokio::test]
async fn test_low_quality_identity_is_banned_for_good() {
    let harness = TestHarness::setup().await;
    harness.seed_trust(WORKER, 25, Utc::now().timestamp_millis());

    let response = harness.complete("m-1", &answer("buy spam now")).await;
    assert_eq!(response.status, 403);
    assert_eq!(response.body, json!({ "status": "banned" }));
    assert_eq!(harness.quality(WORKER).await, Some(15));

    let calls = harness.classifier.calls();
    let again = harness.complete("m-2", &answer("a thoughtful answer")).await;
    assert_eq!(again.status, 403);
    assert_eq!(again.body, json!({ "status": "banned" }));
    assert_eq!(harness.classifier.calls(), calls, "banned identities are not classified");
    assert_eq!(harness.quality(WORKER).await, Some(15));
}

#[tokio::test]
async fn test_idle_quality_decays_before_update() {
    let harness = TestHarness::setup().await;
    let week_ago = Utc::now().timestamp_millis() - 7 * DAY_MS;
    harness.seed_trust(WORKER, 50, week_ago);

    let response = harness.complete("m-1", &answer("a red car")).await;
    assert_eq!(response.status, 200);
    assert_eq!(harness.quality(WORKER).await, Some(44));
}

#[tokio::test]
async fn test_classifier_outage_leaves_record_untouched() {
    let harness = TestHarness::setup().await;
    let now = Utc::now().timestamp_millis();
    harness.seed_trust(WORKER, 30, now);
    harness.classifier.set_down(true);

    let response = harness.complete("m-1", &answer("a red car")).await;
    assert_eq!(response.status, 503);
    assert_eq!(response.body["retryable"], true);
    assert_eq!(harness.classifier.calls(), 2);

    let record = harness.node.trust().standing(WORKER).await.unwrap().unwrap();
    assert_eq!(record.quality, 30);
    assert_eq!(record.last_active_ms, now);
    assert!(!record.banned);
}

#[tokio::test]
async fn test_reset_lifts_ban() {
    let harness = TestHarness::setup().await;
    harness.seed_trust(WORKER, 21, Utc::now().timestamp_millis());
    assert_eq!(harness.complete("m-1", &answer("spam")).await.status, 403);

    assert!(harness.node.trust().reset(WORKER).await.unwrap());
    assert_eq!(harness.quality(WORKER).await, None);

    let response = harness.complete("m-2", &answer("a red car")).await;
    assert_eq!(response.status, 200);
    assert_eq!(harness.quality(WORKER).await, Some(51));
}

#[tokio::test]
async fn test_parallel_answers_all_count() {
    let harness = TestHarness::setup().await;
    let bodies: Vec<Value> = (0..8).map(|i| answer(&format!("answer {i}"))).collect();

    let responses = join_all(
        bodies
            .iter()
            .enumerate()
            .map(|(i, body)| harness.complete(if i % 2 == 0 { "m-even" } else { "m-odd" }, body)),
    )
    .await;
    assert!(responses.iter().all(|r| r.status == 200));
    assert_eq!(harness.quality(WORKER).await, Some(58));
}
