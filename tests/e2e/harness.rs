//! Test harness wiring a node to in-memory collaborators.
//!
//! The `TestHarness` builds a real `RunningNode` with a scripted chain, a
//! keyword classifier and a recording webhook transport, and exposes the
//! gateway endpoints as plain async calls.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use attentium_node::api::{ApiResponse, Gateway, VerifyHeaders};
use attentium_node::classifier::{ClassifierError, ContentClassifier};
use attentium_node::config::ServiceConfig;
use attentium_node::payment::{
    ChainClient, ChainError, ObservedTransaction, TokenTransfer, TransactionLookup,
};
use attentium_node::trust::{MemoryTrustStore, TrustRecord, Verdict};
use attentium_node::webhook::{TransportError, WebhookDelivery, WebhookTransport};
use attentium_node::{NodeBuilder, RunningNode};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Treasury every test invoice pays.
pub const TREASURY: &str = "Treasury1111111111111111111111111111111111";

/// Wallet that signs test payments.
pub const PAYER: &str = "Payer11111111111111111111111111111111111111";

/// Admin credential configured on the test node.
pub const ADMIN_KEY: &str = "e2e-admin-key-0123456789abcdef";

/// Chain whose transactions are registered by the test.
#[derive(Default)]
pub struct FakeChain {
    transactions: Mutex<HashMap<String, TransactionLookup>>,
    down: AtomicBool,
    lookups: AtomicU32,
}

impl FakeChain {
    /// Register a finalized transfer of `base_units` to each `(owner, base_units)` pair.
    pub fn pay(&self, signature: &str, memo: &str, payments: &[(&str, u64)]) {
        let transfers = payments
            .iter()
            .map(|(owner, base_units)| TokenTransfer {
                authority: PAYER.to_string(),
                destination: format!("{owner}-ata"),
                recipient_owner: Some((*owner).to_string()),
                mint: attentium_node::config::USDC_MINT.to_string(),
                amount_base_units: *base_units,
                decimals: 6,
            })
            .collect();
        self.set(
            signature,
            TransactionLookup::Finalized(ObservedTransaction {
                transfers,
                memos: vec![memo.to_string()],
                failed: false,
            }),
        );
    }

    /// Register any lookup result.
    pub fn set(&self, signature: &str, lookup: TransactionLookup) {
        self.transactions.lock().insert(signature.to_string(), lookup);
    }

    /// Make every lookup fail.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Number of lookups served.
    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn transaction(&self, signature: &str) -> Result<TransactionLookup, ChainError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(ChainError("rpc unreachable".to_string()));
        }
        Ok(self
            .transactions
            .lock()
            .get(signature)
            .cloned()
            .unwrap_or(TransactionLookup::Missing))
    }
}

/// Rejects answers containing "spam", accepts everything else.
#[derive(Default)]
pub struct KeywordClassifier {
    down: AtomicBool,
    calls: AtomicU32,
}

impl KeywordClassifier {
    /// Make every call fail.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Number of classify calls.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentClassifier for KeywordClassifier {
    async fn classify(
        &self,
        _question: Option<&str>,
        answer: &str,
    ) -> Result<Verdict, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(ClassifierError("model timeout".to_string()));
        }
        if answer.to_lowercase().contains("spam") {
            Ok(Verdict::Rejected)
        } else {
            Ok(Verdict::Accepted)
        }
    }
}

/// Records deliveries instead of sending them.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<WebhookDelivery>>,
    fail: AtomicBool,
}

impl RecordingTransport {
    /// Deliveries so far.
    pub fn sent(&self) -> Vec<WebhookDelivery> {
        self.sent.lock().clone()
    }

    /// Make every delivery fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn deliver(&self, delivery: &WebhookDelivery) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError("callback unreachable".to_string()));
        }
        self.sent.lock().push(delivery.clone());
        Ok(())
    }
}

/// A node wired to fakes.
pub struct TestHarness {
    /// The node under test.
    pub node: RunningNode,
    /// Request handlers.
    pub gateway: Arc<Gateway>,
    /// Scripted chain.
    pub chain: Arc<FakeChain>,
    /// Keyword classifier.
    pub classifier: Arc<KeywordClassifier>,
    /// Recording webhook transport.
    pub transport: Arc<RecordingTransport>,
    /// Trust records, for seeding.
    pub trust_store: Arc<MemoryTrustStore>,
}

impl TestHarness {
    /// Configuration with fast retries.
    pub fn config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.payment.recipient = TREASURY.to_string();
        config.payment.max_attempts = 3;
        config.payment.initial_backoff_ms = 1;
        config.payment.max_backoff_ms = 2;
        config.classifier.max_attempts = 2;
        config.classifier.initial_backoff_ms = 1;
        config.admin_key = Some(ADMIN_KEY.to_string());
        config
    }

    /// Build a node with the default test configuration.
    pub async fn setup() -> Self {
        Self::setup_with_config(Self::config()).await
    }

    /// Build a node with `config`.
    pub async fn setup_with_config(config: ServiceConfig) -> Self {
        let chain = Arc::new(FakeChain::default());
        let classifier = Arc::new(KeywordClassifier::default());
        let transport = Arc::new(RecordingTransport::default());
        let trust_store = Arc::new(MemoryTrustStore::new());

        let node = NodeBuilder::new(config)
            .with_chain(chain.clone())
            .with_classifier(classifier.clone())
            .with_webhook_transport(transport.clone())
            .with_trust_store(trust_store.clone())
            .build()
            .await
            .expect("node should build");
        let gateway = node.gateway();

        Self {
            node,
            gateway,
            chain,
            classifier,
            transport,
            trust_store,
        }
    }

    /// `POST /v1/verify` with the given headers.
    pub async fn verify(&self, headers: &[(&str, &str)], body: &Value) -> ApiResponse {
        let headers = VerifyHeaders::from_pairs(headers.iter().copied());
        let body = serde_json::to_vec(body).unwrap();
        self.gateway.verify(&headers, &body, Utc::now()).await
    }

    /// Pay for and activate `campaign_id`. Returns the 200 body.
    pub async fn create_paid(&self, campaign_id: &str, signature: &str, body: &Value) -> Value {
        let invoice = self.verify(&[], body).await;
        assert_eq!(invoice.status, 402, "unexpected invoice response: {:?}", invoice.body);
        let amount = invoice.body["payment"]["amount"].as_str().unwrap();
        let base_units = to_base_units(amount);

        self.chain.pay(signature, campaign_id, &[(TREASURY, base_units)]);
        let response = self
            .verify(
                &[
                    ("X-Solana-Tx-Signature", signature),
                    ("X-Campaign-Id", campaign_id),
                ],
                body,
            )
            .await;
        assert_eq!(response.status, 200, "activation failed: {:?}", response.body);
        response.body
    }

    /// `GET /v1/campaigns/{id}/results`.
    pub async fn results(&self, campaign_id: &str, key: Option<&str>) -> ApiResponse {
        self.gateway.campaign_results(campaign_id, key).await
    }

    /// `POST /v1/matches/{id}/complete`.
    pub async fn complete(&self, match_id: &str, body: &Value) -> ApiResponse {
        let body = serde_json::to_vec(body).unwrap();
        self.gateway.complete_match(match_id, &body, Utc::now()).await
    }

    /// Current stored quality of `wallet`.
    pub async fn quality(&self, wallet: &str) -> Option<i64> {
        self.node
            .trust()
            .standing(wallet)
            .await
            .unwrap()
            .map(|r| r.quality)
    }

    /// Seed a trust record.
    pub fn seed_trust(&self, wallet: &str, quality: i64, last_active_ms: i64) {
        self.trust_store.seed(TrustRecord {
            identity: wallet.to_string(),
            quality,
            last_active_ms,
            banned: false,
        });
    }
}

/// Convert a decimal token amount string to base units (6 decimals).
pub fn to_base_units(amount: &str) -> u64 {
    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    let frac = format!("{frac:0<6}");
    whole.parse::<u64>().unwrap() * 1_000_000 + frac[..6].parse::<u64>().unwrap()
}
