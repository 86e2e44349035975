//! Signed webhooks.
//!
//! Payloads are serialized once and the HMAC is computed over those bytes,
//! which are then sent unchanged with `X-Attentium-Signature: sha256=<hex>`.

mod notifier;
mod signer;

pub use notifier::{
    HttpTransport, TransportError, WebhookDelivery, WebhookEvent, WebhookNotifier,
    WebhookTransport, RESPONSE_ACCEPTED,
};
pub use signer::{sign, signature_header, verify_signature, SIGNATURE_PREFIX};
