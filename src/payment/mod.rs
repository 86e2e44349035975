//! Payment verification for attentium-node.
//!
//! A campaign activates only after its funding transaction is shown to pay
//! the invoice. Signatures are single-use.
//!
//! # Architecture
//!
//! ```text
//! X-Solana-Tx-Signature received
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Check LRU cache     │──── HIT ──► AlreadyConsumed
//! └─────────┬───────────┘
//!          MISS
//!           ▼
//! ┌─────────────────────┐
//! │ Consumed index      │──── HIT ──► AlreadyConsumed
//! └─────────┬───────────┘
//!          MISS
//!           ▼
//! ┌─────────────────────┐
//! │ Chain lookup        │◄── retry while pending
//! └─────────┬───────────┘
//!           ▼
//!   memo / recipient / mint / amount
//!           │
//!           ▼
//!    VerifiedPayment
//! ```

mod cache;
mod chain;
mod rpc;
mod verifier;

pub use cache::{CacheStats, ConsumedCache};
pub use chain::{ChainClient, ChainError, ObservedTransaction, TokenTransfer, TransactionLookup};
pub use rpc::{parse_transaction, RpcChainClient};
pub use verifier::{ExpectedPayment, PaymentVerifier, PaymentVerifierConfig, VerifiedPayment};
