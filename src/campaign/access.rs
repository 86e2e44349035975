//! Capability keys.

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Bytes of entropy in a minted secret.
const SECRET_BYTES: usize = 32;

/// Mint a fresh hex-encoded secret from the OS RNG.
#[must_use]
pub fn mint_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time equality of two keys.
///
/// Lengths are compared in the clear; only the contents are protected.
#[must_use]
pub fn keys_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Pre-shared credential that allows campaign creation without payment.
///
/// Only built from the admin header at the boundary.
#[derive(Clone)]
pub struct AdminCredential(String);

impl AdminCredential {
    /// Wrap a header value.
    #[must_use]
    pub fn from_header(value: &str) -> Self {
        Self(value.trim().to_string())
    }

    /// Check against the configured key. Always false when none is configured.
    #[must_use]
    pub fn matches(&self, configured: Option<&str>) -> bool {
        match configured {
            Some(key) if !key.is_empty() && !self.0.is_empty() => keys_match(key, &self.0),
            _ => false,
        }
    }
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminCredential(..)")
    }
}
