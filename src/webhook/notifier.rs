//! Outbound webhook delivery.

use super::signer::signature_header;
use crate::campaign::{Campaign, CampaignStatus};
use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::event::{NodeEvent, NodeEventsSender};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Event name for an accepted response.
pub const RESPONSE_ACCEPTED: &str = "response.accepted";

/// Body of a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event name.
    pub event: String,
    /// Campaign the event belongs to.
    pub campaign_id: String,
    /// Match that produced the response.
    pub match_id: String,
    /// Worker wallet.
    pub wallet: String,
    /// Worker answer.
    pub answer: String,
    /// Seconds of attention paid for.
    pub verified_seconds: u32,
    /// Worker payout after fees.
    pub net_payout: Decimal,
    /// Campaign progress after this response.
    pub completed_quantity: u32,
    /// Campaign target.
    pub target_quantity: u32,
    /// Campaign status after this response.
    pub status: CampaignStatus,
    /// When the response was accepted.
    pub timestamp: DateTime<Utc>,
}

/// One signed request, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookDelivery {
    /// Callback URL.
    pub url: String,
    /// Signature header name.
    pub header_name: String,
    /// Signature header value (`sha256=<hex>`).
    pub signature: String,
    /// The exact bytes that were signed.
    pub body: Bytes,
}

/// The transport could not deliver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("webhook delivery failed: {0}")]
pub struct TransportError(pub String);

/// Sends signed webhook requests.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST `delivery.body` to `delivery.url` with the signature header.
    async fn deliver(&self, delivery: &WebhookDelivery) -> std::result::Result<(), TransportError>;
}

/// `reqwest` transport.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build webhook client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn deliver(&self, delivery: &WebhookDelivery) -> std::result::Result<(), TransportError> {
        let response = self
            .http
            .post(&delivery.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(delivery.header_name.as_str(), delivery.signature.as_str())
            .body(delivery.body.clone())
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError(format!("callback returned HTTP {}", response.status())))
        }
    }
}

/// Signs and delivers campaign webhooks.
pub struct WebhookNotifier {
    transport: Arc<dyn WebhookTransport>,
    header_name: String,
    events: Option<NodeEventsSender>,
}

impl WebhookNotifier {
    /// Create a notifier.
    #[must_use]
    pub fn new(transport: Arc<dyn WebhookTransport>, config: &WebhookConfig) -> Self {
        Self {
            transport,
            header_name: config.signature_header.clone(),
            events: None,
        }
    }

    /// Broadcast delivery failures on `events`.
    #[must_use]
    pub fn with_events(mut self, events: NodeEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Serialize `event` once and sign those bytes with the campaign secret.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the event cannot be encoded.
    pub fn prepare(&self, url: &str, secret: &str, event: &WebhookEvent) -> Result<WebhookDelivery> {
        let body = Bytes::from(serde_json::to_vec(event)?);
        Ok(WebhookDelivery {
            url: url.to_string(),
            header_name: self.header_name.clone(),
            signature: signature_header(secret, &body),
            body,
        })
    }

    /// Deliver `event` to the campaign's callback, if it has one.
    ///
    /// Best-effort: failures are logged and broadcast, never returned.
    /// Returns true if the callback acknowledged the delivery.
    pub async fn notify(&self, campaign: &Campaign, event: &WebhookEvent) -> bool {
        let Some(url) = campaign.callback_url.as_deref() else {
            debug!("Campaign {} has no callback, skipping webhook", campaign.id);
            return false;
        };

        let outcome = match self.prepare(url, &campaign.webhook_secret, event) {
            Ok(delivery) => self.transport.deliver(&delivery).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(()) => {
                info!("Webhook {} delivered for campaign {}", event.event, campaign.id);
                true
            }
            Err(message) => {
                warn!("Webhook for campaign {} failed: {message}", campaign.id);
                if let Some(tx) = &self.events {
                    let _ = tx.send(NodeEvent::WebhookFailed {
                        campaign_id: campaign.id.clone(),
                        message,
                    });
                }
                false
            }
        }
    }
}
