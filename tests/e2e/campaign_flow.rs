//! Invoice, payment and campaign access through the public endpoints.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{to_base_units, TestHarness, ADMIN_KEY, PAYER, TREASURY};
use attentium_node::payment::TransactionLookup;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

fn request() -> Value {
    json!({
        "duration": 30,
        "quantity": 2,
        "bid_per_second": "0.05",
        "validation_question": "What colour is the car?",
        "content_url": "https://example.test/ad.mp4"
    })
}

#[tokio::test]
async fn test_unpaid_request_returns_invoice() {
    let harness = TestHarness::setup().await;
    let response = harness.verify(&[], &request()).await;

    assert_eq!(response.status, 402);
    let payment = &response.body["payment"];
    assert_eq!(payment["chain"], "solana");
    assert_eq!(payment["token"], "USDC");
    assert_eq!(payment["recipient"], TREASURY);
    assert_eq!(
        Decimal::from_str(payment["amount"].as_str().unwrap()).unwrap(),
        Decimal::new(15, 1)
    );
    assert!(payment.get("instruction_data").is_none());
}

#[tokio::test]
async fn test_float_bid_is_priced_exactly() {
    let harness = TestHarness::setup().await;
    let body = json!({ "duration": 30, "bid_per_second": 0.1 });
    let response = harness.verify(&[], &body).await;

    assert_eq!(response.status, 402);
    assert_eq!(to_base_units(response.body["payment"]["amount"].as_str().unwrap()), 3_000_000);
}

#[tokio::test]
async fn test_invalid_requests_are_400() {
    let harness = TestHarness::setup().await;

    let bad_duration = json!({ "duration": 20, "bid_per_second": "0.05" });
    assert_eq!(harness.verify(&[], &bad_duration).await.status, 400);

    let low_bid = json!({ "duration": 10, "bid_per_second": "0.00001" });
    assert_eq!(harness.verify(&[], &low_bid).await.status, 400);

    let no_quantity = json!({ "duration": 10, "bid_per_second": "0.05", "quantity": 0 });
    assert_eq!(harness.verify(&[], &no_quantity).await.status, 400);

    let response = harness
        .verify(&[("X-Solana-Tx-Signature", "sig1")], &request())
        .await;
    assert_eq!(response.status, 400, "campaign id is required with a payment");
}

#[tokio::test]
async fn test_paid_campaign_activates_and_is_readable() {
    let harness = TestHarness::setup().await;
    let body = harness.create_paid("camp-1", "sig1", &request()).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["campaign_id"], "camp-1");
    assert_eq!(body["order"]["tx_hash"], "sig1");
    assert_eq!(body["order"]["payer"], PAYER);
    assert_eq!(body["order"]["duration"], 30);
    let read_key = body["read_key"].as_str().unwrap();
    assert_eq!(read_key.len(), 64);
    assert_ne!(body["webhook_secret"], body["read_key"]);

    assert_eq!(harness.results("camp-1", None).await.status, 401);
    assert_eq!(harness.results("camp-1", Some("wrong")).await.status, 401);
    assert_eq!(harness.results("unknown", Some(read_key)).await.status, 401);

    let results = harness.results("camp-1", Some(read_key)).await;
    assert_eq!(results.status, 200);
    assert_eq!(
        results.body,
        json!({ "status": "active", "completed_quantity": 0, "target_quantity": 2 })
    );
}

#[tokio::test]
async fn test_replayed_signature_is_consumed() {
    let harness = TestHarness::setup().await;
    harness.create_paid("camp-1", "sig1", &request()).await;

    let replay = harness
        .verify(
            &[("X-Solana-Tx-Signature", "sig1"), ("X-Campaign-Id", "camp-1")],
            &request(),
        )
        .await;
    assert_eq!(replay.status, 400);
    assert!(replay.body["error"].as_str().unwrap().contains("already consumed"));

    let lookups = harness.chain.lookups();
    let again = harness
        .verify(
            &[("X-Solana-Tx-Signature", "sig1"), ("X-Campaign-Id", "camp-1")],
            &request(),
        )
        .await;
    assert_eq!(again.status, 400);
    assert_eq!(harness.chain.lookups(), lookups, "replays never reach the chain");
}

#[tokio::test]
async fn test_concurrent_replay_activates_once() {
    let harness = TestHarness::setup().await;
    harness.chain.pay("sigRace", "camp-race", &[(TREASURY, 1_500_000)]);
    let headers = [
        ("X-Solana-Tx-Signature", "sigRace"),
        ("X-Campaign-Id", "camp-race"),
    ];
    let body = request();

    let (a, b, c) = tokio::join!(
        harness.verify(&headers, &body),
        harness.verify(&headers, &body),
        harness.verify(&headers, &body),
    );
    let statuses = [a.status, b.status, c.status];
    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 400).count(), 2);
}

#[tokio::test]
async fn test_payment_mismatches_are_rejected() {
    let harness = TestHarness::setup().await;
    let headers = |sig: &'static str| [("X-Solana-Tx-Signature", sig), ("X-Campaign-Id", "camp-1")];

    harness.chain.pay("short", "camp-1", &[(TREASURY, 1_000_000)]);
    assert_eq!(harness.verify(&headers("short"), &request()).await.status, 400);

    harness.chain.pay("elsewhere", "camp-1", &[("Mallory", 1_500_000)]);
    assert_eq!(harness.verify(&headers("elsewhere"), &request()).await.status, 400);

    harness.chain.pay("othermemo", "camp-2", &[(TREASURY, 1_500_000)]);
    assert_eq!(harness.verify(&headers("othermemo"), &request()).await.status, 400);

    let missing = harness.verify(&headers("nowhere"), &request()).await;
    assert_eq!(missing.status, 402);
    assert_eq!(missing.body["retryable"], false);

    // None of the failures consumed anything; a correct payment still works
    harness.create_paid("camp-1", "good", &request()).await;
}

#[tokio::test]
async fn test_pending_and_outage_are_retryable() {
    let harness = TestHarness::setup().await;
    harness.chain.set("pending", TransactionLookup::Pending);

    let pending = harness
        .verify(
            &[("X-Solana-Tx-Signature", "pending"), ("X-Campaign-Id", "camp-1")],
            &request(),
        )
        .await;
    assert_eq!(pending.status, 402);
    assert_eq!(pending.body["retryable"], true);
    assert_eq!(harness.chain.lookups(), 3);

    harness.chain.set_down(true);
    let outage = harness
        .verify(
            &[("X-Solana-Tx-Signature", "any"), ("X-Campaign-Id", "camp-1")],
            &request(),
        )
        .await;
    assert_eq!(outage.status, 503);
    assert_eq!(outage.body["retryable"], true);

    // The campaign id was never taken
    harness.chain.set_down(false);
    harness.create_paid("camp-1", "later", &request()).await;
}

#[tokio::test]
async fn test_referral_flows_through_invoice_and_order() {
    let harness = TestHarness::setup().await;
    let referrer = [("X-Referrer-Agent", "ReferrerAgent")];

    let invoice = harness.verify(&referrer, &request()).await;
    assert_eq!(invoice.status, 402);
    let data = &invoice.body["payment"]["instruction_data"];
    assert_eq!(data["referrer"], "ReferrerAgent");
    let bps = data["referrer_bps"].as_u64().unwrap();
    assert!(bps <= 10_000);
    assert_eq!(bps, 2_000);

    harness.chain.pay(
        "sigRef",
        "camp-ref",
        &[(TREASURY, 1_200_000), ("ReferrerAgent", 300_000)],
    );
    let response = harness
        .verify(
            &[
                ("X-Solana-Tx-Signature", "sigRef"),
                ("X-Campaign-Id", "camp-ref"),
                ("X-Referrer-Agent", "ReferrerAgent"),
            ],
            &request(),
        )
        .await;
    assert_eq!(response.status, 200, "{:?}", response.body);
    let order = &response.body["order"];
    assert_eq!(order["referrer"], "ReferrerAgent");
    assert_eq!(order["referrer_bps"], 2_000);
    assert_eq!(to_base_units(order["referrer_amount"].as_str().unwrap()), 300_000);
}

#[tokio::test]
async fn test_self_referral_cannot_skim_treasury() {
    let harness = TestHarness::setup().await;
    let headers = [
        ("X-Solana-Tx-Signature", "sigSkim"),
        ("X-Campaign-Id", "camp-skim"),
        ("X-Referrer-Agent", PAYER),
    ];

    harness
        .chain
        .pay("sigSkim", "camp-skim", &[(TREASURY, 1), (PAYER, 1_499_999)]);
    let skim = harness.verify(&headers, &request()).await;
    assert_eq!(skim.status, 400);
    assert!(skim.body["error"].as_str().unwrap().contains("amount mismatch"));

    // Nothing was consumed; paying the split as invoiced activates
    harness
        .chain
        .pay("sigSkim", "camp-skim", &[(TREASURY, 1_200_000), (PAYER, 300_000)]);
    let response = harness.verify(&headers, &request()).await;
    assert_eq!(response.status, 200, "{:?}", response.body);
    assert_eq!(response.body["order"]["referrer"], PAYER);
}

#[tokio::test]
async fn test_admin_header_bypasses_payment() {
    let harness = TestHarness::setup().await;

    let response = harness.verify(&[("X-Admin-Key", ADMIN_KEY)], &request()).await;
    assert_eq!(response.status, 200);
    let id = response.body["campaign_id"].as_str().unwrap();
    assert!(id.starts_with("admin-"));
    assert_eq!(response.body["order"]["tx_hash"], id);
    assert_eq!(harness.chain.lookups(), 0);

    let key = response.body["read_key"].as_str().unwrap();
    assert_eq!(harness.results(id, Some(key)).await.status, 200);

    let wrong = harness.verify(&[("X-Admin-Key", "guess")], &request()).await;
    assert_eq!(wrong.status, 401);
}

#[tokio::test]
async fn test_admin_disabled_without_configured_key() {
    let mut config = TestHarness::config();
    config.admin_key = None;
    let harness = TestHarness::setup_with_config(config).await;

    let response = harness.verify(&[("X-Admin-Key", ADMIN_KEY)], &request()).await;
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn test_failed_campaign_stops_counting() {
    let harness = TestHarness::setup().await;
    let body = harness.create_paid("camp-1", "sig1", &request()).await;
    let key = body["read_key"].as_str().unwrap();

    harness.node.campaigns().mark_failed("camp-1").await.unwrap();
    let results = harness.results("camp-1", Some(key)).await;
    assert_eq!(results.body["status"], "failed");

    let submit = json!({
        "answer": "a red car",
        "actualDuration": 30,
        "exitedEarly": false,
        "bidId": "camp-1",
        "wallet": "Worker1"
    });
    assert_eq!(harness.complete("m-1", &submit).await.status, 200);
    let results = harness.results("camp-1", Some(key)).await;
    assert_eq!(results.body["completed_quantity"], 0);
}
