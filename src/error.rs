//! Error types for attentium-node.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a payment proof is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// The chain has no record of the transaction.
    #[error("transaction {0} not found")]
    NotFound(String),

    /// The transaction exists but has not reached finality.
    #[error("transaction {0} is not finalized yet")]
    NotFinalized(String),

    /// Transferred amount differs from the invoice.
    #[error("amount mismatch: expected {expected}, paid {actual}")]
    AmountMismatch {
        /// Invoice amount.
        expected: Decimal,
        /// Amount found on chain.
        actual: Decimal,
    },

    /// Funds went to someone other than the invoice recipient.
    #[error("recipient mismatch: expected {expected}, paid to {actual}")]
    RecipientMismatch {
        /// Invoice recipient.
        expected: String,
        /// Destination found on chain.
        actual: String,
    },

    /// Transfer used a different token mint.
    #[error("token mismatch: expected {expected}, paid in {actual}")]
    TokenMismatch {
        /// Invoice token mint.
        expected: String,
        /// Mint found on chain.
        actual: String,
    },

    /// The memo does not carry the campaign id.
    #[error("memo mismatch: expected {expected:?}, found {actual:?}")]
    MemoMismatch {
        /// Campaign id the memo must carry.
        expected: String,
        /// Memo found on chain, if any.
        actual: Option<String>,
    },

    /// The transaction landed with an execution error.
    #[error("transaction {0} failed on chain")]
    TransactionFailed(String),

    /// The signature already funded a campaign.
    #[error("transaction {0} was already consumed")]
    AlreadyConsumed(String),
}

impl PaymentError {
    /// Returns true if the caller may retry the same signature later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotFinalized(_))
    }
}

/// Errors that can occur in attentium-node.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range request fields.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Payment proof rejected.
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Missing or wrong capability key.
    #[error("unauthorized")]
    Unauthorized,

    /// Identity is below the trust threshold.
    #[error("identity {0} is banned")]
    Banned(String),

    /// An external collaborator could not be reached after retries.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        /// Which collaborator failed (chain, classifier, ...).
        collaborator: &'static str,
        /// Last failure seen.
        reason: String,
    },

    /// Optimistic update lost too many races.
    #[error("contention on {0}")]
    Contention(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Node is shutting down.
    #[error("node is shutting down")]
    ShuttingDown,
}

impl Error {
    /// HTTP status the boundary answers with for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Payment(PaymentError::NotFound(_) | PaymentError::NotFinalized(_)) => 402,
            Self::Payment(_) => 400,
            Self::Unauthorized => 401,
            Self::Banned(_) => 403,
            Self::Unavailable { .. } | Self::Contention(_) | Self::ShuttingDown => 503,
            Self::Config(_) | Self::Storage(_) | Self::Io(_) | Self::Serialization(_) => 500,
        }
    }

    /// Returns true if the same request may succeed when retried later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Payment(e) => e.is_retryable(),
            Self::Unavailable { .. } | Self::Contention(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
