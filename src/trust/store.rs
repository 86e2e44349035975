//! Trust record persistence.

use crate::Result;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Reputation state of one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRecord {
    /// Wallet address.
    pub identity: String,
    /// Quality score. May go negative.
    pub quality: i64,
    /// Last submission, unix milliseconds.
    pub last_active_ms: i64,
    /// Set once quality drops below the ban threshold. Sticky.
    pub banned: bool,
}

/// A stored value and the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Stored value.
    pub value: T,
    /// Incremented on every successful write.
    pub version: u64,
}

/// Versioned per-identity storage.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Load a record with its version.
    async fn load(&self, identity: &str) -> Result<Option<Versioned<TrustRecord>>>;

    /// Write `record` if the stored version is still `expected`.
    ///
    /// `expected == None` means "only if absent". Returns false when another
    /// writer got there first.
    async fn compare_and_swap(
        &self,
        identity: &str,
        expected: Option<u64>,
        record: TrustRecord,
    ) -> Result<bool>;

    /// Delete a record. Returns true if one existed.
    async fn remove(&self, identity: &str) -> Result<bool>;
}

/// In-process trust store sharded by identity.
#[derive(Default)]
pub struct MemoryTrustStore {
    records: DashMap<String, Versioned<TrustRecord>>,
}

impl MemoryTrustStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record, replacing any existing one.
    pub fn seed(&self, record: TrustRecord) {
        let version = self
            .records
            .get(&record.identity)
            .map_or(0, |existing| existing.version);
        self.records.insert(
            record.identity.clone(),
            Versioned {
                value: record,
                version: version + 1,
            },
        );
    }
}

#[async_trait]
impl TrustStore for MemoryTrustStore {
    async fn load(&self, identity: &str) -> Result<Option<Versioned<TrustRecord>>> {
        Ok(self.records.get(identity).map(|r| r.value().clone()))
    }

    async fn compare_and_swap(
        &self,
        identity: &str,
        expected: Option<u64>,
        record: TrustRecord,
    ) -> Result<bool> {
        match self.records.entry(identity.to_string()) {
            Entry::Occupied(mut entry) => {
                let current = entry.get().version;
                if expected != Some(current) {
                    return Ok(false);
                }
                entry.insert(Versioned {
                    value: record,
                    version: current + 1,
                });
                Ok(true)
            }
            Entry::Vacant(entry) => {
                if expected.is_some() {
                    return Ok(false);
                }
                entry.insert(Versioned {
                    value: record,
                    version: 1,
                });
                Ok(true)
            }
        }
    }

    async fn remove(&self, identity: &str) -> Result<bool> {
        Ok(self.records.remove(identity).is_some())
    }
}
