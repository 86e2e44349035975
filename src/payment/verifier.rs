//! Payment verifier binding an on-chain transfer to an invoice.
//!
//! This is the core payment verification logic for attentium-node.

use crate::campaign::ConsumedIndex;
use crate::config::{PaymentConfig, MIN_ATTEMPTS};
use crate::error::{Error, PaymentError, Result};
use crate::invoice::Referral;
use crate::payment::cache::{CacheStats, ConsumedCache};
use crate::payment::chain::{ChainClient, ObservedTransaction, TokenTransfer, TransactionLookup};
use backoff::future::retry;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Longest signature string accepted before asking the chain.
const MAX_SIGNATURE_LEN: usize = 128;

/// Configuration for the payment verifier.
#[derive(Debug, Clone)]
pub struct PaymentVerifierConfig {
    /// Token mint every transfer must use.
    pub token_mint: String,
    /// Token decimals; amounts must agree to within one base unit.
    pub token_decimals: u32,
    /// Chain lookups before giving up on a pending transaction.
    pub max_attempts: u32,
    /// Retry policy between lookups.
    pub backoff: backoff::ExponentialBackoff,
    /// Cache capacity (number of signatures to remember).
    pub cache_capacity: usize,
}

impl From<&PaymentConfig> for PaymentVerifierConfig {
    fn from(payment: &PaymentConfig) -> Self {
        Self {
            token_mint: payment.token_mint.clone(),
            token_decimals: payment.token_decimals,
            max_attempts: payment.max_attempts,
            backoff: payment.backoff(),
            cache_capacity: payment.cache_capacity,
        }
    }
}

impl Default for PaymentVerifierConfig {
    fn default() -> Self {
        Self::from(&PaymentConfig::default())
    }
}

/// What the transaction must show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedPayment {
    /// Invoice amount.
    pub amount: Decimal,
    /// Treasury address.
    pub recipient: String,
    /// Campaign id the memo must carry.
    pub memo: String,
    /// Referral the amount is split with. The treasury leg and the referrer
    /// leg are each held to their share of `amount`.
    pub referral: Option<Referral>,
}

/// A transaction that satisfied an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    /// Transaction signature (the idempotency key).
    pub tx_signature: String,
    /// Paying wallet.
    pub payer: String,
    /// Treasury leg plus referrer leg.
    pub amount: Decimal,
}

/// Outcome of one lookup inside the retry loop.
enum Attempt {
    Final(ObservedTransaction),
    Missing,
    StillPending,
}

/// Checks payment proofs against invoices.
///
/// Combines:
/// 1. LRU cache of signatures known to be consumed (fast replay refusal)
/// 2. The consumed-signature index (authoritative)
/// 3. A chain lookup with bounded retries while the transaction finalizes
pub struct PaymentVerifier {
    chain: Arc<dyn ChainClient>,
    consumed: Arc<dyn ConsumedIndex>,
    cache: ConsumedCache,
    config: PaymentVerifierConfig,
}

impl PaymentVerifier {
    /// Create a new payment verifier.
    #[must_use]
    pub fn new(
        chain: Arc<dyn ChainClient>,
        consumed: Arc<dyn ConsumedIndex>,
        config: PaymentVerifierConfig,
    ) -> Self {
        let cache = ConsumedCache::with_capacity(config.cache_capacity);

        info!(
            "Payment verifier initialized (cache_capacity={}, max_attempts={}, mint={})",
            config.cache_capacity, config.max_attempts, config.token_mint
        );

        Self {
            chain,
            consumed,
            cache,
            config,
        }
    }

    /// Verify that `tx_signature` pays `expected`.
    ///
    /// 1. Refuse signatures already consumed (cache, then index)
    /// 2. Look the transaction up, retrying while it is not finalized
    /// 3. Compare memo, recipient, mint and amount
    ///
    /// Verification does not consume the signature; the campaign store does
    /// that atomically with activation.
    ///
    /// # Errors
    ///
    /// * `PaymentError::AlreadyConsumed` - signature already funded a campaign
    /// * `PaymentError::NotFound` - chain has no such transaction
    /// * `PaymentError::NotFinalized` - still pending after all attempts (retryable)
    /// * `PaymentError::{Memo,Recipient,Token,Amount}Mismatch`, `TransactionFailed`
    /// * `Error::Unavailable` - chain unreachable after all attempts
    pub async fn verify_payment(
        &self,
        expected: &ExpectedPayment,
        tx_signature: &str,
    ) -> Result<VerifiedPayment> {
        validate_signature(tx_signature)?;

        if self.is_consumed(tx_signature).await? {
            warn!("Replay of consumed transaction {tx_signature}");
            return Err(PaymentError::AlreadyConsumed(tx_signature.to_string()).into());
        }

        let observed = match self.lookup_with_retry(tx_signature).await? {
            Attempt::Final(observed) => observed,
            Attempt::Missing => {
                debug!("Transaction {tx_signature} not found on chain");
                return Err(PaymentError::NotFound(tx_signature.to_string()).into());
            }
            Attempt::StillPending => {
                warn!(
                    "Transaction {tx_signature} not finalized after {} attempts",
                    self.config.max_attempts
                );
                return Err(PaymentError::NotFinalized(tx_signature.to_string()).into());
            }
        };

        let verified = self.check_transaction(expected, tx_signature, &observed)?;
        info!(
            "Payment {} verified: {} from {} for campaign {}",
            tx_signature, verified.amount, verified.payer, expected.memo
        );
        Ok(verified)
    }

    /// Remember a signature the store has just consumed.
    pub fn mark_consumed(&self, tx_signature: &str) {
        self.cache.insert(tx_signature);
    }

    /// Get cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn is_consumed(&self, tx_signature: &str) -> Result<bool> {
        if self.cache.contains(tx_signature) {
            debug!("Signature {tx_signature} found in consumed cache");
            return Ok(true);
        }
        let consumed = self.consumed.is_consumed(tx_signature).await?;
        if consumed {
            self.cache.insert(tx_signature);
        }
        Ok(consumed)
    }

    async fn lookup_with_retry(&self, tx_signature: &str) -> Result<Attempt> {
        let max_attempts = self.config.max_attempts.max(MIN_ATTEMPTS);
        let mut attempt = 0u32;

        retry(self.config.backoff.clone(), || {
            attempt += 1;
            let this_attempt = attempt;
            let chain = Arc::clone(&self.chain);

            async move {
                let last = this_attempt >= max_attempts;
                match chain.transaction(tx_signature).await {
                    Ok(TransactionLookup::Finalized(observed)) => Ok(Attempt::Final(observed)),
                    Ok(TransactionLookup::Missing) => Ok(Attempt::Missing),
                    Ok(TransactionLookup::Pending) if last => Ok(Attempt::StillPending),
                    Ok(TransactionLookup::Pending) => {
                        debug!("Transaction {tx_signature} pending (attempt {this_attempt}/{max_attempts})");
                        Err(backoff::Error::transient(Error::Payment(
                            PaymentError::NotFinalized(tx_signature.to_string()),
                        )))
                    }
                    Err(e) => {
                        warn!("Chain lookup failed (attempt {this_attempt}/{max_attempts}): {e}");
                        let err = Error::Unavailable {
                            collaborator: "chain",
                            reason: e.to_string(),
                        };
                        if last {
                            Err(backoff::Error::permanent(err))
                        } else {
                            Err(backoff::Error::transient(err))
                        }
                    }
                }
            }
        })
        .await
    }

    fn check_transaction(
        &self,
        expected: &ExpectedPayment,
        tx_signature: &str,
        observed: &ObservedTransaction,
    ) -> Result<VerifiedPayment> {
        if observed.failed {
            return Err(PaymentError::TransactionFailed(tx_signature.to_string()).into());
        }

        if !observed.memos.iter().any(|m| m.trim() == expected.memo) {
            return Err(PaymentError::MemoMismatch {
                expected: expected.memo.clone(),
                actual: observed.memos.first().cloned(),
            }
            .into());
        }

        let to_treasury: Vec<&TokenTransfer> = observed
            .transfers
            .iter()
            .filter(|t| t.paid_to(&expected.recipient))
            .collect();
        if to_treasury.is_empty() {
            return Err(PaymentError::RecipientMismatch {
                expected: expected.recipient.clone(),
                actual: observed
                    .transfers
                    .first()
                    .map_or_else(|| "no token transfer".to_string(), |t| t.destination.clone()),
            }
            .into());
        }

        let epsilon = Decimal::new(1, self.config.token_decimals.min(28));
        let (treasury_due, referrer_due) = match &expected.referral {
            Some(referral) => {
                let split = referral.split(expected.amount, self.config.token_decimals);
                (split.treasury_amount, Some((referral.referrer.as_str(), split.referrer_amount)))
            }
            None => (expected.amount, None),
        };

        let to_referrer: Vec<&TokenTransfer> = referrer_due.map_or_else(Vec::new, |(referrer, _)| {
            observed
                .transfers
                .iter()
                .filter(|t| t.paid_to(referrer) && !t.paid_to(&expected.recipient))
                .collect()
        });

        if let Some(wrong) = to_treasury
            .iter()
            .chain(to_referrer.iter())
            .find(|t| t.mint != self.config.token_mint)
        {
            return Err(PaymentError::TokenMismatch {
                expected: self.config.token_mint.clone(),
                actual: wrong.mint.clone(),
            }
            .into());
        }

        let treasury_paid: Decimal = to_treasury.iter().map(|t| t.amount()).sum();
        if (treasury_paid - treasury_due).abs() >= epsilon {
            return Err(PaymentError::AmountMismatch {
                expected: treasury_due,
                actual: treasury_paid,
            }
            .into());
        }

        let referrer_paid: Decimal = to_referrer.iter().map(|t| t.amount()).sum();
        if let Some((referrer, due)) = referrer_due {
            if (referrer_paid - due).abs() >= epsilon {
                debug!("Referrer {referrer} leg is {referrer_paid}, expected {due}");
                return Err(PaymentError::AmountMismatch {
                    expected: due,
                    actual: referrer_paid,
                }
                .into());
            }
        }

        Ok(VerifiedPayment {
            tx_signature: tx_signature.to_string(),
            payer: to_treasury[0].authority.clone(),
            amount: treasury_paid + referrer_paid,
        })
    }
}

fn validate_signature(tx_signature: &str) -> Result<()> {
    if tx_signature.is_empty()
        || tx_signature.len() > MAX_SIGNATURE_LEN
        || !tx_signature.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(Error::InvalidRequest(
            "transaction signature must be a base58 string".to_string(),
        ));
    }
    Ok(())
}
