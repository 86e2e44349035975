//! Campaign creation and access.

use super::{
    keys_match, AdminCredential, Campaign, CampaignAuthority, CampaignDraft, CampaignSnapshot,
    CampaignStatus, CampaignStore,
};
use crate::error::{Error, PaymentError, Result};
use crate::event::{NodeEvent, NodeEventsSender};
use crate::payment::{ExpectedPayment, PaymentVerifier};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Payer recorded on admin campaigns.
const ADMIN_PAYER: &str = "admin";

/// Proof that an invoice was paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentProof {
    /// Funding transaction signature.
    pub tx_signature: String,
}

/// What allows a draft to become an active campaign.
#[derive(Debug, Clone)]
pub enum Authorization {
    /// A verified on-chain payment.
    Payment(PaymentProof),
    /// The pre-shared admin credential.
    Admin(AdminCredential),
}

/// Creates campaigns and guards their results.
pub struct CampaignService {
    store: Arc<dyn CampaignStore>,
    verifier: Arc<PaymentVerifier>,
    recipient: String,
    admin_key: Option<String>,
    events: Option<NodeEventsSender>,
}

/// Fresh id for a campaign created with the admin credential.
#[must_use]
pub fn admin_campaign_id() -> String {
    format!("admin-{}", Uuid::new_v4())
}

impl CampaignService {
    /// Create a service over `store`, verifying payments to `recipient`.
    #[must_use]
    pub fn new(
        store: Arc<dyn CampaignStore>,
        verifier: Arc<PaymentVerifier>,
        recipient: String,
        admin_key: Option<String>,
    ) -> Self {
        Self {
            store,
            verifier,
            recipient,
            admin_key,
            events: None,
        }
    }

    /// Broadcast lifecycle events on `events`.
    #[must_use]
    pub fn with_events(mut self, events: NodeEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Activate `draft`.
    ///
    /// A payment is verified against the draft's escrow and id before the
    /// campaign is stored; storing consumes the signature. Admin drafts should
    /// carry an id from [`admin_campaign_id`], which doubles as their tx hash.
    ///
    /// # Errors
    ///
    /// Payment failures from the verifier or the store, `Unauthorized` for a
    /// wrong admin credential, `InvalidRequest` for a taken id.
    pub async fn create(
        &self,
        draft: CampaignDraft,
        authorization: Authorization,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let campaign = match authorization {
            Authorization::Payment(proof) => self.create_paid(draft, &proof, now).await?,
            Authorization::Admin(credential) => self.create_admin(draft, &credential, now).await?,
        };

        self.emit(NodeEvent::CampaignActivated {
            campaign_id: campaign.id.clone(),
            tx_hash: campaign.tx_hash.clone(),
        });
        Ok(campaign)
    }

    async fn create_paid(
        &self,
        draft: CampaignDraft,
        proof: &PaymentProof,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let expected = ExpectedPayment {
            amount: draft.total_escrow,
            recipient: self.recipient.clone(),
            memo: draft.id.clone(),
            referral: draft.referral.clone(),
        };

        let verified = match self.verifier.verify_payment(&expected, &proof.tx_signature).await {
            Ok(verified) => verified,
            Err(e) => {
                self.reject(&proof.tx_signature, &e);
                return Err(e);
            }
        };

        let campaign = Campaign::activate(
            draft,
            verified.payer,
            verified.tx_signature,
            CampaignAuthority::Payment,
            now,
        );

        match self.store.activate_paid(campaign.clone()).await {
            Ok(()) => {
                self.verifier.mark_consumed(&campaign.tx_hash);
                Ok(campaign)
            }
            Err(e) => {
                if matches!(e, Error::Payment(PaymentError::AlreadyConsumed(_))) {
                    self.verifier.mark_consumed(&campaign.tx_hash);
                }
                self.reject(&proof.tx_signature, &e);
                Err(e)
            }
        }
    }

    async fn create_admin(
        &self,
        draft: CampaignDraft,
        credential: &AdminCredential,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        if !credential.matches(self.admin_key.as_deref()) {
            warn!("Rejected admin campaign request with a bad credential");
            return Err(Error::Unauthorized);
        }

        let tx_hash = draft.id.clone();
        let campaign = Campaign::activate(
            draft,
            ADMIN_PAYER.to_string(),
            tx_hash,
            CampaignAuthority::Admin,
            now,
        );
        self.store.insert_admin(campaign.clone()).await?;
        Ok(campaign)
    }

    /// Read a campaign's progress.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when the id is unknown or the key does not match.
    pub async fn get_status(&self, id: &str, provided_key: &str) -> Result<CampaignSnapshot> {
        let campaign = self.store.get(id).await?.ok_or(Error::Unauthorized)?;
        if !keys_match(&campaign.read_key, provided_key) {
            return Err(Error::Unauthorized);
        }
        Ok(campaign.snapshot())
    }

    /// Fetch a campaign without a key check (internal callers only).
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn get(&self, id: &str) -> Result<Option<Campaign>> {
        self.store.get(id).await
    }

    /// Count one accepted response.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn record_completion(&self, id: &str) -> Result<Option<Campaign>> {
        let updated = self.store.record_completion(id).await?;
        if let Some(campaign) = &updated {
            if campaign.status == CampaignStatus::Completed {
                info!("Campaign {id} reached {} responses", campaign.target_quantity);
                self.emit(NodeEvent::CampaignCompleted {
                    campaign_id: campaign.id.clone(),
                });
            }
        }
        Ok(updated)
    }

    /// Fail a campaign. Terminal.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an unknown or completed campaign.
    pub async fn mark_failed(&self, id: &str) -> Result<Campaign> {
        self.store.mark_failed(id).await
    }

    fn reject(&self, tx_signature: &str, error: &Error) {
        warn!("Payment {tx_signature} rejected: {error}");
        self.emit(NodeEvent::PaymentRejected {
            tx_signature: tx_signature.to_string(),
            reason: error.to_string(),
        });
    }

    fn emit(&self, event: NodeEvent) {
        if let Some(tx) = &self.events {
            // No subscribers is fine
            let _ = tx.send(event);
        }
    }
}
