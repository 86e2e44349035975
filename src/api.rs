//! HTTP-facing request handling.
//!
//! Handlers take raw headers and body bytes and return a status code with a
//! JSON body, so any server can mount them:
//!
//! | Route                              | Handler                     |
//! |------------------------------------|-----------------------------|
//! | `POST /v1/verify`                  | [`Gateway::verify`]         |
//! | `GET /v1/campaigns/{id}/results`   | [`Gateway::campaign_results`] |
//! | `POST /v1/matches/{id}/complete`   | [`Gateway::complete_match`] |

use crate::campaign::{
    admin_campaign_id, AdminCredential, Authorization, Campaign, CampaignDraft, CampaignRequest,
    CampaignService, PaymentProof,
};
use crate::error::{Error, Result};
use crate::invoice::InvoiceNegotiator;
use crate::submission::{Submission, SubmissionService};
use crate::trust::SubmissionOutcome;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Header carrying the funding transaction signature.
pub const TX_SIGNATURE_HEADER: &str = "X-Solana-Tx-Signature";
/// Header carrying the campaign id the memo binds to.
pub const CAMPAIGN_ID_HEADER: &str = "X-Campaign-Id";
/// Header naming a referrer.
pub const REFERRER_HEADER: &str = "X-Referrer-Agent";
/// Header carrying the admin credential.
pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// Status code and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl ApiResponse {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    fn from_error(error: &Error) -> Self {
        let status = error.status_code();
        let body = match error {
            Error::Banned(_) => json!({ "status": "banned" }),
            _ => json!({
                "success": false,
                "error": error.to_string(),
                "retryable": error.is_retryable(),
            }),
        };
        Self::new(status, body)
    }
}

/// Headers relevant to `POST /v1/verify`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyHeaders {
    /// `X-Solana-Tx-Signature`.
    pub tx_signature: Option<String>,
    /// `X-Campaign-Id`.
    pub campaign_id: Option<String>,
    /// `X-Referrer-Agent`.
    pub referrer: Option<String>,
    /// `X-Admin-Key`.
    pub admin_key: Option<String>,
}

impl VerifyHeaders {
    /// Pick the known headers out of `(name, value)` pairs, ignoring case and
    /// blank values.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut headers = Self::default();
        for (name, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = if name.eq_ignore_ascii_case(TX_SIGNATURE_HEADER) {
                &mut headers.tx_signature
            } else if name.eq_ignore_ascii_case(CAMPAIGN_ID_HEADER) {
                &mut headers.campaign_id
            } else if name.eq_ignore_ascii_case(REFERRER_HEADER) {
                &mut headers.referrer
            } else if name.eq_ignore_ascii_case(ADMIN_KEY_HEADER) {
                &mut headers.admin_key
            } else {
                continue;
            };
            *slot = Some(value.to_string());
        }
        headers
    }
}

/// Entry point for the public endpoints.
pub struct Gateway {
    negotiator: InvoiceNegotiator,
    campaigns: Arc<CampaignService>,
    submissions: Arc<SubmissionService>,
}

impl Gateway {
    /// Create a gateway.
    #[must_use]
    pub fn new(
        negotiator: InvoiceNegotiator,
        campaigns: Arc<CampaignService>,
        submissions: Arc<SubmissionService>,
    ) -> Self {
        Self {
            negotiator,
            campaigns,
            submissions,
        }
    }

    /// `POST /v1/verify`.
    ///
    /// Without a signature the caller gets the invoice (402). With one, the
    /// payment is verified and the campaign activated (200). The admin header
    /// skips payment.
    pub async fn verify(&self, headers: &VerifyHeaders, body: &[u8], now: DateTime<Utc>) -> ApiResponse {
        match self.try_verify(headers, body, now).await {
            Ok(response) => response,
            Err(e) => {
                debug!("verify failed: {e}");
                ApiResponse::from_error(&e)
            }
        }
    }

    async fn try_verify(
        &self,
        headers: &VerifyHeaders,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<ApiResponse> {
        let request: CampaignRequest = serde_json::from_slice(body)
            .map_err(|e| Error::InvalidRequest(format!("malformed body: {e}")))?;
        let referrer = headers.referrer.as_deref();

        if let Some(admin_key) = &headers.admin_key {
            let referral = referrer.map(|r| self.negotiator.referral(r)).transpose()?;
            let draft = CampaignDraft::new(&admin_campaign_id(), request, referral)?;
            let authorization = Authorization::Admin(AdminCredential::from_header(admin_key));
            let campaign = self.campaigns.create(draft, authorization, now).await?;
            return Ok(ApiResponse::ok(self.activated_body(&campaign)));
        }

        let Some(tx_signature) = &headers.tx_signature else {
            if request.quantity == 0 {
                return Err(Error::InvalidRequest("quantity must be at least 1".to_string()));
            }
            let invoice =
                self.negotiator
                    .create_invoice(request.duration, request.bid_per_second, referrer)?;
            return Ok(ApiResponse::new(402, json!({ "payment": invoice })));
        };

        let campaign_id = headers.campaign_id.as_deref().ok_or_else(|| {
            Error::InvalidRequest(format!("{CAMPAIGN_ID_HEADER} is required with a payment"))
        })?;
        let referral = referrer.map(|r| self.negotiator.referral(r)).transpose()?;
        let draft = CampaignDraft::new(campaign_id, request, referral)?;
        let authorization = Authorization::Payment(PaymentProof {
            tx_signature: tx_signature.clone(),
        });
        let campaign = self.campaigns.create(draft, authorization, now).await?;
        Ok(ApiResponse::ok(self.activated_body(&campaign)))
    }

    fn activated_body(&self, campaign: &Campaign) -> Value {
        let mut order = Map::new();
        order.insert("duration".into(), json!(campaign.duration));
        order.insert("bid_per_second".into(), json!(campaign.bid_per_second));
        order.insert("total_escrow".into(), json!(campaign.total_escrow));
        order.insert("tx_hash".into(), json!(campaign.tx_hash));
        order.insert("payer".into(), json!(campaign.payer));
        if let Some(referral) = &campaign.referral {
            let split = referral.split(campaign.total_escrow, self.negotiator.token_decimals());
            order.insert("referrer".into(), json!(referral.referrer));
            order.insert("referrer_bps".into(), json!(referral.referrer_bps));
            order.insert("referrer_amount".into(), json!(split.referrer_amount));
        }

        json!({
            "success": true,
            "campaign_id": campaign.id,
            "order": order,
            "read_key": campaign.read_key,
            "webhook_secret": campaign.webhook_secret,
        })
    }

    /// `GET /v1/campaigns/{id}/results?key=<read_key>`.
    pub async fn campaign_results(&self, campaign_id: &str, key: Option<&str>) -> ApiResponse {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return ApiResponse::from_error(&Error::Unauthorized);
        };
        match self.campaigns.get_status(campaign_id, key).await {
            Ok(snapshot) => ApiResponse::ok(json!(snapshot)),
            Err(e) => ApiResponse::from_error(&e),
        }
    }

    /// `POST /v1/matches/{id}/complete`.
    pub async fn complete_match(&self, match_id: &str, body: &[u8], now: DateTime<Utc>) -> ApiResponse {
        let submission: Submission = match serde_json::from_slice(body) {
            Ok(submission) => submission,
            Err(e) => {
                return ApiResponse::from_error(&Error::InvalidRequest(format!(
                    "malformed body: {e}"
                )))
            }
        };

        match self.submissions.complete(match_id, &submission, now).await {
            Ok(receipt) if receipt.outcome == SubmissionOutcome::Rejected => {
                ApiResponse::ok(json!({ "success": false, "status": "rejected" }))
            }
            Ok(_) => ApiResponse::ok(json!({ "success": true })),
            Err(e) => ApiResponse::from_error(&e),
        }
    }
}
