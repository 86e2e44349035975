//! Trust transitions.
//!
//! Every submission passes through [`transition`]: stale records decay by one
//! point per idle day, then the verdict's reward or penalty applies. Decay
//! always comes first. A record that drops below the ban threshold is banned
//! for good.

use super::store::{TrustRecord, TrustStore};
use crate::config::TrustConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Classifier verdict on one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Relevant answer.
    Accepted,
    /// Spam or irrelevant answer.
    Rejected,
}

/// What the submitter observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Counted.
    Accepted,
    /// Not counted; the identity stays active.
    Rejected,
    /// The identity is banned.
    Banned,
}

/// Result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustDecision {
    /// What the submitter observes.
    pub outcome: SubmissionOutcome,
    /// Quality after the transition.
    pub quality: i64,
}

/// Apply one verdict to a record.
///
/// A missing record starts at `initial_quality`, active as of `now_ms`.
#[must_use]
pub fn transition(
    current: Option<&TrustRecord>,
    identity: &str,
    verdict: Verdict,
    now_ms: i64,
    config: &TrustConfig,
) -> TrustRecord {
    let (quality, last_active_ms, banned) = current.map_or(
        (config.initial_quality, now_ms, false),
        |r| (r.quality, r.last_active_ms, r.banned),
    );

    let idle_ms = now_ms.saturating_sub(last_active_ms).max(0);
    let decay = idle_ms / config.decay_interval_ms.max(1);
    let delta = match verdict {
        Verdict::Accepted => config.reward,
        Verdict::Rejected => -config.penalty,
    };
    let quality = quality.saturating_sub(decay).saturating_add(delta);

    TrustRecord {
        identity: identity.to_string(),
        quality,
        last_active_ms: now_ms,
        banned: banned || quality < config.ban_threshold,
    }
}

/// Outcome a submitter sees for a record after its transition.
#[must_use]
pub fn outcome_of(record: &TrustRecord, verdict: Verdict) -> SubmissionOutcome {
    if record.banned {
        SubmissionOutcome::Banned
    } else if verdict == Verdict::Rejected {
        SubmissionOutcome::Rejected
    } else {
        SubmissionOutcome::Accepted
    }
}

/// Per-identity reputation over a [`TrustStore`].
pub struct TrustEngine {
    store: Arc<dyn TrustStore>,
    config: TrustConfig,
}

impl TrustEngine {
    /// Create an engine over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TrustStore>, config: TrustConfig) -> Self {
        Self { store, config }
    }

    /// Record a verdict for `identity`.
    ///
    /// Loads, transitions and writes back with compare-and-swap, retrying
    /// when a concurrent submission for the same identity wins the race.
    ///
    /// # Errors
    ///
    /// `Contention` after `max_update_attempts` lost races; storage errors.
    pub async fn on_submission(
        &self,
        identity: &str,
        verdict: Verdict,
        now: DateTime<Utc>,
    ) -> Result<TrustDecision> {
        let now_ms = now.timestamp_millis();

        for attempt in 1..=self.config.max_update_attempts.max(1) {
            let current = self.store.load(identity).await?;
            let (previous, version) = match &current {
                Some(v) => (Some(&v.value), Some(v.version)),
                None => (None, None),
            };
            let next = transition(previous, identity, verdict, now_ms, &self.config);
            let newly_banned = next.banned && !previous.is_some_and(|r| r.banned);

            if self
                .store
                .compare_and_swap(identity, version, next.clone())
                .await?
            {
                if newly_banned {
                    info!("Identity {identity} banned at quality {}", next.quality);
                }
                debug!(
                    "Trust {identity}: {:?} -> quality {}",
                    verdict, next.quality
                );
                return Ok(TrustDecision {
                    outcome: outcome_of(&next, verdict),
                    quality: next.quality,
                });
            }
            debug!("Trust update for {identity} lost a race (attempt {attempt})");
        }

        warn!("Trust update for {identity} gave up after repeated conflicts");
        Err(Error::Contention(format!("trust record {identity}")))
    }

    /// Stored record for `identity`, without decay applied.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn standing(&self, identity: &str) -> Result<Option<TrustRecord>> {
        Ok(self.store.load(identity).await?.map(|v| v.value))
    }

    /// Returns true if `identity` is banned.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn is_banned(&self, identity: &str) -> Result<bool> {
        Ok(self.standing(identity).await?.is_some_and(|r| r.banned))
    }

    /// Forget `identity`; its next submission starts from scratch.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn reset(&self, identity: &str) -> Result<bool> {
        let removed = self.store.remove(identity).await?;
        if removed {
            info!("Trust record for {identity} reset");
        }
        Ok(removed)
    }
}
