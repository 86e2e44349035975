//! HMAC-SHA256 webhook signatures.
//!
//! The signature covers the exact bytes on the wire. Receivers must verify the
//! raw body they received, never a re-serialized copy.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Hex HMAC-SHA256 of `body` under `secret`.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    hex::encode(digest(secret, body))
}

/// Header value for `body`: `sha256=<hex>`.
#[must_use]
pub fn signature_header(secret: &str, body: &[u8]) -> String {
    format!("{SIGNATURE_PREFIX}{}", sign(secret, body))
}

/// Check a received header value against the raw body.
///
/// Accepts the value with or without the `sha256=` prefix. Comparison is
/// constant-time over the decoded digest.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let provided = header.trim();
    let provided = provided.strip_prefix(SIGNATURE_PREFIX).unwrap_or(provided);
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    digest(secret, body).ct_eq(provided.as_slice()).into()
}

fn digest(secret: &str, body: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}
