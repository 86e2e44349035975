//! Chain-client contract used by the payment verifier.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// One SPL token transfer inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    /// Transfer authority (the payer wallet).
    pub authority: String,
    /// Destination token account.
    pub destination: String,
    /// Owner of the destination token account, when the chain reports it.
    pub recipient_owner: Option<String>,
    /// Token mint.
    pub mint: String,
    /// Amount in base units.
    pub amount_base_units: u64,
    /// Token decimals.
    pub decimals: u32,
}

impl TokenTransfer {
    /// Amount as a decimal in whole tokens.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.amount_base_units), self.decimals.min(28))
    }

    /// Whether `address` names the destination (owner wallet or token account).
    #[must_use]
    pub fn paid_to(&self, address: &str) -> bool {
        self.destination == address || self.recipient_owner.as_deref() == Some(address)
    }
}

/// The token transfers and memos carried by one finalized transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedTransaction {
    /// Token transfers, outer instructions first.
    pub transfers: Vec<TokenTransfer>,
    /// Memo payloads.
    pub memos: Vec<String>,
    /// True when the transaction executed with an error.
    pub failed: bool,
}

/// What the chain knows about a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionLookup {
    /// No such transaction.
    Missing,
    /// Seen but not yet finalized.
    Pending,
    /// Finalized.
    Finalized(ObservedTransaction),
}

/// The chain could not answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("chain unavailable: {0}")]
pub struct ChainError(pub String);

/// Looks up transactions by signature.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch the transfers and memos carried by `signature`.
    async fn transaction(&self, signature: &str) -> Result<TransactionLookup, ChainError>;
}
