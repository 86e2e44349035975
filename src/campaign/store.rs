//! Campaign persistence.
//!
//! The consumed-signature set and the campaign map live behind the same lock
//! in [`MemoryCampaignStore`], so activating a paid campaign and consuming its
//! signature is one step: both happen or neither does.

use super::{Campaign, CampaignStatus};
use crate::error::{Error, PaymentError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Read side of the consumed-signature index.
#[async_trait]
pub trait ConsumedIndex: Send + Sync {
    /// Returns true if `signature` already funded a campaign.
    async fn is_consumed(&self, signature: &str) -> Result<bool>;
}

/// Campaign persistence.
#[async_trait]
pub trait CampaignStore: ConsumedIndex {
    /// Store an active paid campaign and consume `campaign.tx_hash` atomically.
    ///
    /// # Errors
    ///
    /// `PaymentError::AlreadyConsumed` if the signature was used before,
    /// `InvalidRequest` if the id is taken. Nothing is written on error.
    async fn activate_paid(&self, campaign: Campaign) -> Result<()>;

    /// Store a campaign created with the admin credential.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if the id is taken.
    async fn insert_admin(&self, campaign: Campaign) -> Result<()>;

    /// Fetch a campaign.
    async fn get(&self, id: &str) -> Result<Option<Campaign>>;

    /// Count one accepted response against an active campaign.
    ///
    /// Returns the updated campaign, or `None` if the id is unknown or the
    /// campaign no longer accepts responses.
    async fn record_completion(&self, id: &str) -> Result<Option<Campaign>>;

    /// Move a campaign to `failed`.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if the id is unknown or the campaign already completed.
    async fn mark_failed(&self, id: &str) -> Result<Campaign>;
}

#[derive(Default)]
struct Inner {
    campaigns: HashMap<String, Campaign>,
    consumed: HashSet<String>,
}

/// In-process campaign store.
#[derive(Default)]
pub struct MemoryCampaignStore {
    inner: Mutex<Inner>,
}

impl MemoryCampaignStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored campaigns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().campaigns.len()
    }

    /// Returns true if no campaign is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().campaigns.is_empty()
    }

    fn insert_new(inner: &mut Inner, campaign: Campaign) -> Result<()> {
        if inner.campaigns.contains_key(&campaign.id) {
            return Err(Error::InvalidRequest(format!(
                "campaign id {} is already in use",
                campaign.id
            )));
        }
        inner.campaigns.insert(campaign.id.clone(), campaign);
        Ok(())
    }
}

#[async_trait]
impl ConsumedIndex for MemoryCampaignStore {
    async fn is_consumed(&self, signature: &str) -> Result<bool> {
        Ok(self.inner.lock().consumed.contains(signature))
    }
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    async fn activate_paid(&self, campaign: Campaign) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.consumed.contains(&campaign.tx_hash) {
            return Err(PaymentError::AlreadyConsumed(campaign.tx_hash).into());
        }
        let tx_hash = campaign.tx_hash.clone();
        let id = campaign.id.clone();
        Self::insert_new(&mut inner, campaign)?;
        inner.consumed.insert(tx_hash.clone());
        info!("Campaign {id} activated by {tx_hash}");
        Ok(())
    }

    async fn insert_admin(&self, campaign: Campaign) -> Result<()> {
        let id = campaign.id.clone();
        Self::insert_new(&mut self.inner.lock(), campaign)?;
        info!("Campaign {id} activated by admin credential");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Campaign>> {
        Ok(self.inner.lock().campaigns.get(id).cloned())
    }

    async fn record_completion(&self, id: &str) -> Result<Option<Campaign>> {
        let mut inner = self.inner.lock();
        let Some(campaign) = inner.campaigns.get_mut(id) else {
            debug!("Completion for unknown campaign {id}");
            return Ok(None);
        };
        if !campaign.record_completion() {
            debug!("Campaign {id} is {}, completion ignored", campaign.status);
            return Ok(None);
        }
        Ok(Some(campaign.clone()))
    }

    async fn mark_failed(&self, id: &str) -> Result<Campaign> {
        let mut inner = self.inner.lock();
        let campaign = inner
            .campaigns
            .get_mut(id)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown campaign {id}")))?;
        if campaign.status == CampaignStatus::Completed {
            return Err(Error::InvalidRequest(format!(
                "campaign {id} already completed"
            )));
        }
        if campaign.status != CampaignStatus::Failed {
            campaign.status = CampaignStatus::Failed;
            info!("Campaign {id} marked failed");
        }
        Ok(campaign.clone())
    }
}
