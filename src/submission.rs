//! Worker submissions.
//!
//! A completed match runs the answer through the classifier and the trust
//! gate. Accepted answers count towards their campaign, settle and are
//! announced to the campaign's callback.

use crate::campaign::{Campaign, CampaignService, CampaignStatus};
use crate::classifier::{classify_with_retry, ContentClassifier};
use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use crate::event::{NodeEvent, NodeEventsSender};
use crate::settlement::{settle, Settlement};
use crate::trust::{SubmissionOutcome, TrustEngine};
use crate::webhook::{WebhookEvent, WebhookNotifier, RESPONSE_ACCEPTED};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Body of a match completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Worker answer.
    pub answer: String,
    /// Seconds the worker stayed.
    #[serde(default)]
    pub actual_duration: u32,
    /// Whether the worker left before the end.
    #[serde(default)]
    pub exited_early: bool,
    /// Campaign the match belongs to.
    #[serde(default)]
    pub bid_id: Option<String>,
    /// Worker wallet (the trust identity).
    pub wallet: String,
}

/// Result of a submission that was not banned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// Accepted or rejected.
    pub outcome: SubmissionOutcome,
    /// Quality after the transition.
    pub quality: i64,
    /// Payout, when the answer counted towards an active campaign.
    pub settlement: Option<Settlement>,
    /// Campaign state after counting the answer.
    pub campaign_status: Option<CampaignStatus>,
}

/// Knobs the submission flow needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct SubmissionSettings {
    /// Classifier retry policy.
    pub classifier: ClassifierConfig,
    /// Platform fee on payouts.
    pub fee_bps: u16,
    /// Token decimals for payout rounding.
    pub token_decimals: u32,
}

/// Routes submissions through classifier, trust gate, campaign and webhook.
pub struct SubmissionService {
    campaigns: Arc<CampaignService>,
    trust: Arc<TrustEngine>,
    classifier: Arc<dyn ContentClassifier>,
    notifier: Arc<WebhookNotifier>,
    settings: SubmissionSettings,
    events: Option<NodeEventsSender>,
}

impl SubmissionService {
    /// Create the service.
    #[must_use]
    pub fn new(
        campaigns: Arc<CampaignService>,
        trust: Arc<TrustEngine>,
        classifier: Arc<dyn ContentClassifier>,
        notifier: Arc<WebhookNotifier>,
        settings: SubmissionSettings,
    ) -> Self {
        Self {
            campaigns,
            trust,
            classifier,
            notifier,
            settings,
            events: None,
        }
    }

    /// Broadcast trust outcomes on `events`.
    #[must_use]
    pub fn with_events(mut self, events: NodeEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Process one completed match.
    ///
    /// # Errors
    ///
    /// * `InvalidRequest` - empty wallet
    /// * `Banned` - the identity is, or just became, banned
    /// * `Unavailable` - classifier down; nothing was changed
    /// * `Contention` - trust record too contended
    pub async fn complete(
        &self,
        match_id: &str,
        submission: &Submission,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt> {
        let wallet = submission.wallet.trim();
        if wallet.is_empty() {
            return Err(Error::InvalidRequest("wallet is required".to_string()));
        }

        if self.trust.is_banned(wallet).await? {
            debug!("Submission from banned identity {wallet} refused");
            return Err(Error::Banned(wallet.to_string()));
        }

        let campaign = match submission.bid_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => self.campaigns.get(id).await?,
            _ => None,
        };
        let question = campaign.as_ref().and_then(|c| c.validation_question.as_deref());

        let verdict = classify_with_retry(
            &self.classifier,
            &self.settings.classifier,
            question,
            &submission.answer,
        )
        .await?;

        let decision = self.trust.on_submission(wallet, verdict, now).await?;
        match decision.outcome {
            SubmissionOutcome::Banned => {
                self.emit(NodeEvent::IdentityBanned {
                    identity: wallet.to_string(),
                    quality: decision.quality,
                });
                return Err(Error::Banned(wallet.to_string()));
            }
            SubmissionOutcome::Rejected => {
                self.emit(NodeEvent::ResponseRejected {
                    identity: wallet.to_string(),
                    quality: decision.quality,
                });
                return Ok(SubmissionReceipt {
                    outcome: decision.outcome,
                    quality: decision.quality,
                    settlement: None,
                    campaign_status: campaign.map(|c| c.status),
                });
            }
            SubmissionOutcome::Accepted => {}
        }

        self.emit(NodeEvent::ResponseAccepted {
            identity: wallet.to_string(),
            campaign_id: campaign.as_ref().map(|c| c.id.clone()),
            quality: decision.quality,
        });

        let Some(campaign) = campaign else {
            return Ok(SubmissionReceipt {
                outcome: decision.outcome,
                quality: decision.quality,
                settlement: None,
                campaign_status: None,
            });
        };

        let Some(updated) = self.campaigns.record_completion(&campaign.id).await? else {
            return Ok(SubmissionReceipt {
                outcome: decision.outcome,
                quality: decision.quality,
                settlement: None,
                campaign_status: Some(campaign.status),
            });
        };

        let settlement = settle(
            updated.duration,
            updated.bid_per_second,
            submission.actual_duration,
            submission.exited_early,
            self.settings.fee_bps,
            self.settings.token_decimals,
        );
        info!(
            "Response for campaign {} settled: {} net to {wallet}",
            updated.id, settlement.net
        );

        let event = accepted_event(&updated, match_id, wallet, submission, &settlement, now);
        self.notifier.notify(&updated, &event).await;

        Ok(SubmissionReceipt {
            outcome: decision.outcome,
            quality: decision.quality,
            settlement: Some(settlement),
            campaign_status: Some(updated.status),
        })
    }

    fn emit(&self, event: NodeEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

fn accepted_event(
    campaign: &Campaign,
    match_id: &str,
    wallet: &str,
    submission: &Submission,
    settlement: &Settlement,
    now: DateTime<Utc>,
) -> WebhookEvent {
    WebhookEvent {
        event: RESPONSE_ACCEPTED.to_string(),
        campaign_id: campaign.id.clone(),
        match_id: match_id.to_string(),
        wallet: wallet.to_string(),
        answer: submission.answer.clone(),
        verified_seconds: settlement.verified_seconds,
        net_payout: settlement.net,
        completed_quantity: campaign.completed_quantity,
        target_quantity: campaign.target_quantity,
        status: campaign.status,
        timestamp: now,
    }
}
