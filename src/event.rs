//! Node event system.

use std::net::SocketAddr;
use tokio::sync::broadcast;

/// Events emitted by the node.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Node has started successfully.
    Started,

    /// The HTTP API is accepting connections.
    Listening {
        /// Bound address.
        addr: SocketAddr,
    },

    /// Node is shutting down.
    ShuttingDown,

    /// A campaign became active.
    CampaignActivated {
        /// Campaign id.
        campaign_id: String,
        /// Funding transaction (synthetic for admin campaigns).
        tx_hash: String,
    },

    /// A campaign reached its target quantity.
    CampaignCompleted {
        /// Campaign id.
        campaign_id: String,
    },

    /// A payment proof was refused.
    PaymentRejected {
        /// Signature presented.
        tx_signature: String,
        /// Why it was refused.
        reason: String,
    },

    /// A worker answer passed the trust gate.
    ResponseAccepted {
        /// Worker identity.
        identity: String,
        /// Campaign the answer counted towards, if known.
        campaign_id: Option<String>,
        /// Quality after the transition.
        quality: i64,
    },

    /// A worker answer was rejected.
    ResponseRejected {
        /// Worker identity.
        identity: String,
        /// Quality after the transition.
        quality: i64,
    },

    /// An identity fell below the ban threshold.
    IdentityBanned {
        /// Worker identity.
        identity: String,
        /// Quality after the transition.
        quality: i64,
    },

    /// A webhook could not be delivered.
    WebhookFailed {
        /// Campaign id.
        campaign_id: String,
        /// Error message.
        message: String,
    },
}

/// Channel for receiving node events.
pub type NodeEventsChannel = broadcast::Receiver<NodeEvent>;

/// Sender for node events.
pub type NodeEventsSender = broadcast::Sender<NodeEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (NodeEventsSender, NodeEventsChannel) {
    broadcast::channel(256)
}
