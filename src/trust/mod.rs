//! Worker reputation.
//!
//! Identities start at the configured initial quality on first sight. Each
//! submission decays idle records, applies the verdict and bans identities that
//! fall below the threshold. Bans hold until an administrative reset.

mod engine;
mod store;

pub use engine::{outcome_of, transition, SubmissionOutcome, TrustDecision, TrustEngine, Verdict};
pub use store::{MemoryTrustStore, TrustRecord, TrustStore, Versioned};
