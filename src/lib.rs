//! # attentium-node
//!
//! Payment-gated human verification campaigns.
//!
//! A caller pays an on-chain escrow (an SPL token transfer carrying the
//! campaign id as its memo) to commission a number of human responses.
//! Workers answer; each answer passes a classifier and a decaying trust score
//! before it counts, settles and is announced through a signed webhook.
//!
//! ## Architecture
//!
//! - **Invoice**: pure pricing of a campaign request
//! - **Payment**: verifies a transaction against an invoice, single-use
//! - **Campaign**: persistence and capability keys
//! - **Trust**: per-identity reputation with decay and sticky bans
//! - **Webhook**: HMAC-signed notifications
//! - **HTTP**: axum router mounting the public endpoints
//!
//! External systems (chain, storage, classifier, webhook transport) sit behind
//! traits, so every service runs against in-memory fakes in tests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use attentium_node::{NodeBuilder, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = ServiceConfig::default();
//!     config.payment.recipient = "TreasuryWallet".to_string();
//!     let mut node = NodeBuilder::new(config).build().await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod campaign;
pub mod classifier;
pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod invoice;
pub mod node;
pub mod payment;
pub mod settlement;
pub mod submission;
pub mod trust;
pub mod webhook;

pub use api::{ApiResponse, Gateway, VerifyHeaders};
pub use campaign::{Authorization, Campaign, CampaignService, CampaignSnapshot, CampaignStatus};
pub use config::ServiceConfig;
pub use error::{Error, PaymentError, Result};
pub use event::{NodeEvent, NodeEventsChannel};
pub use invoice::{InvoiceNegotiator, PaymentRequirement};
pub use node::{NodeBuilder, RunningNode, ShutdownHandle};
pub use payment::{PaymentVerifier, PaymentVerifierConfig};
pub use trust::{TrustEngine, Verdict};
pub use webhook::{verify_signature, WebhookNotifier};
