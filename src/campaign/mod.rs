//! Campaign records, persistence and capability-key access control.
//!
//! A campaign becomes visible only once it is active: either its funding
//! transaction was verified, or the caller presented the admin credential.
//! Activation mints two secrets per campaign. The read key guards the results
//! endpoint and the webhook secret signs outbound notifications.

mod access;
mod service;
mod store;

pub use access::{keys_match, mint_secret, AdminCredential};
pub use service::{admin_campaign_id, Authorization, CampaignService, PaymentProof};
pub use store::{CampaignStore, ConsumedIndex, MemoryCampaignStore};

use crate::invoice::{total_escrow, validate_bid, CampaignDuration, Referral};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Longest campaign id accepted as a memo payload.
pub const MAX_CAMPAIGN_ID_LEN: usize = 128;

/// Campaign lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Invoice issued, not yet paid. Never stored.
    PendingPayment,
    /// Accepting responses.
    Active,
    /// Target quantity reached.
    Completed,
    /// Administratively failed. Terminal.
    Failed,
}

impl CampaignStatus {
    /// Returns true once no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PendingPayment => "pending_payment",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a campaign was authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignAuthority {
    /// Funded by a verified on-chain transfer.
    Payment,
    /// Created with the admin credential.
    Admin,
}

/// Body of a campaign request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRequest {
    /// Seconds of attention per response.
    pub duration: u32,
    /// Responses wanted.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Price per second of attention.
    pub bid_per_second: Decimal,
    /// Question workers answer.
    #[serde(default)]
    pub validation_question: Option<String>,
    /// Content shown to workers.
    #[serde(default)]
    pub content_url: Option<String>,
    /// Where to deliver webhooks.
    #[serde(default)]
    pub callback_url: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

/// A validated campaign request bound to an id, before authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignDraft {
    /// Campaign id, also the memo the funding transfer must carry.
    pub id: String,
    /// Attention per response.
    pub duration: CampaignDuration,
    /// Price per second.
    pub bid_per_second: Decimal,
    /// `duration * bid_per_second`.
    pub total_escrow: Decimal,
    /// Responses wanted.
    pub target_quantity: u32,
    /// Referrer sharing the payment.
    pub referral: Option<Referral>,
    /// Question workers answer.
    pub validation_question: Option<String>,
    /// Content shown to workers.
    pub content_url: Option<String>,
    /// Where to deliver webhooks.
    pub callback_url: Option<String>,
}

impl CampaignDraft {
    /// Validate `request` and bind it to `id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for a bad id, duration, bid or quantity.
    pub fn new(id: &str, request: CampaignRequest, referral: Option<Referral>) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() || id.len() > MAX_CAMPAIGN_ID_LEN {
            return Err(Error::InvalidRequest(format!(
                "campaign id must be 1..={MAX_CAMPAIGN_ID_LEN} characters"
            )));
        }
        let duration = CampaignDuration::try_from(request.duration)?;
        validate_bid(request.bid_per_second)?;
        if request.quantity == 0 {
            return Err(Error::InvalidRequest("quantity must be at least 1".to_string()));
        }

        Ok(Self {
            id: id.to_string(),
            duration,
            bid_per_second: request.bid_per_second,
            total_escrow: total_escrow(duration, request.bid_per_second),
            target_quantity: request.quantity,
            referral,
            validation_question: non_empty(request.validation_question),
            content_url: non_empty(request.content_url),
            callback_url: non_empty(request.callback_url),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A stored campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign id (memo payload).
    pub id: String,
    /// Attention per response.
    pub duration: CampaignDuration,
    /// Price per second.
    pub bid_per_second: Decimal,
    /// `duration * bid_per_second`.
    pub total_escrow: Decimal,
    /// Responses wanted.
    pub target_quantity: u32,
    /// Responses accepted so far.
    pub completed_quantity: u32,
    /// Lifecycle state.
    pub status: CampaignStatus,
    /// Paying wallet (`admin` for admin campaigns).
    pub payer: String,
    /// Funding transaction signature.
    pub tx_hash: String,
    /// Referrer sharing the payment.
    pub referral: Option<Referral>,
    /// Capability for reading results.
    pub read_key: String,
    /// Key signing outbound webhooks.
    pub webhook_secret: String,
    /// Where to deliver webhooks.
    pub callback_url: Option<String>,
    /// Question workers answer.
    pub validation_question: Option<String>,
    /// Content shown to workers.
    pub content_url: Option<String>,
    /// How the campaign was authorized.
    pub authority: CampaignAuthority,
    /// Activation time.
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Activate a draft with freshly minted secrets.
    #[must_use]
    pub fn activate(
        draft: CampaignDraft,
        payer: String,
        tx_hash: String,
        authority: CampaignAuthority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: draft.id,
            duration: draft.duration,
            bid_per_second: draft.bid_per_second,
            total_escrow: draft.total_escrow,
            target_quantity: draft.target_quantity,
            completed_quantity: 0,
            status: CampaignStatus::Active,
            payer,
            tx_hash,
            referral: draft.referral,
            read_key: mint_secret(),
            webhook_secret: mint_secret(),
            callback_url: draft.callback_url,
            validation_question: draft.validation_question,
            content_url: draft.content_url,
            authority,
            created_at: now,
        }
    }

    /// Public view for read-key holders.
    #[must_use]
    pub fn snapshot(&self) -> CampaignSnapshot {
        CampaignSnapshot {
            status: self.status,
            completed_quantity: self.completed_quantity,
            target_quantity: self.target_quantity,
        }
    }

    /// Count one accepted response. Returns false if the campaign is not active.
    pub fn record_completion(&mut self) -> bool {
        if self.status != CampaignStatus::Active {
            return false;
        }
        self.completed_quantity = (self.completed_quantity + 1).min(self.target_quantity);
        if self.completed_quantity >= self.target_quantity {
            self.status = CampaignStatus::Completed;
        }
        true
    }
}

/// What `get_status` reveals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    /// Lifecycle state.
    pub status: CampaignStatus,
    /// Responses accepted so far.
    pub completed_quantity: u32,
    /// Responses wanted.
    pub target_quantity: u32,
}
