//! Service wiring: collaborators, services and the running node.

use crate::api::Gateway;
use crate::campaign::{CampaignService, CampaignStore, ConsumedIndex, MemoryCampaignStore};
use crate::classifier::{ContentClassifier, HttpClassifier, UnconfiguredClassifier};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::event::{create_event_channel, NodeEvent, NodeEventsChannel, NodeEventsSender};
use crate::http;
use crate::invoice::InvoiceNegotiator;
use crate::payment::{ChainClient, PaymentVerifier, PaymentVerifierConfig, RpcChainClient};
use crate::submission::{SubmissionService, SubmissionSettings};
use crate::trust::{MemoryTrustStore, TrustEngine, TrustStore};
use crate::webhook::{HttpTransport, WebhookNotifier, WebhookTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Builder for constructing an attentium node.
///
/// Every collaborator can be replaced; anything left unset gets the real
/// adapter (or the in-memory store).
pub struct NodeBuilder {
    config: ServiceConfig,
    chain: Option<Arc<dyn ChainClient>>,
    classifier: Option<Arc<dyn ContentClassifier>>,
    transport: Option<Arc<dyn WebhookTransport>>,
    campaign_store: Option<(Arc<dyn CampaignStore>, Arc<dyn ConsumedIndex>)>,
    trust_store: Option<Arc<dyn TrustStore>>,
}

impl NodeBuilder {
    /// Create a new node builder with the given configuration.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            chain: None,
            classifier: None,
            transport: None,
            campaign_store: None,
            trust_store: None,
        }
    }

    /// Use `chain` for transaction lookups.
    #[must_use]
    pub fn with_chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Use `classifier` to judge answers.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ContentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Use `transport` to deliver webhooks.
    #[must_use]
    pub fn with_webhook_transport(mut self, transport: Arc<dyn WebhookTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persist campaigns and consumed signatures in `store`.
    #[must_use]
    pub fn with_campaign_store<S: CampaignStore + 'static>(mut self, store: Arc<S>) -> Self {
        let consumed: Arc<dyn ConsumedIndex> = store.clone();
        let campaigns: Arc<dyn CampaignStore> = store;
        self.campaign_store = Some((campaigns, consumed));
        self
    }

    /// Persist trust records in `store`.
    #[must_use]
    pub fn with_trust_store(mut self, store: Arc<dyn TrustStore>) -> Self {
        self.trust_store = Some(store);
        self
    }

    /// Wire the services.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an HTTP client
    /// cannot be built.
    pub async fn build(self) -> Result<RunningNode> {
        self.config.validate()?;
        info!(
            "Building attentium-node (chain={}, token={}, recipient={})",
            self.config.payment.chain, self.config.payment.token, self.config.payment.recipient
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = create_event_channel();
        let config = self.config;

        let chain: Arc<dyn ChainClient> = match self.chain {
            Some(chain) => chain,
            None => Arc::new(RpcChainClient::new(
                &config.payment.rpc_url,
                Duration::from_secs(config.payment.request_timeout_secs),
            )?),
        };

        let classifier: Arc<dyn ContentClassifier> = match (self.classifier, &config.classifier.endpoint) {
            (Some(classifier), _) => classifier,
            (None, Some(endpoint)) => Arc::new(HttpClassifier::new(
                endpoint,
                Duration::from_secs(config.classifier.request_timeout_secs),
            )?),
            (None, None) => {
                warn!("No classifier endpoint configured; submissions will answer 503");
                Arc::new(UnconfiguredClassifier)
            }
        };

        let transport: Arc<dyn WebhookTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(Duration::from_secs(
                config.webhook.request_timeout_secs,
            ))?),
        };

        let (campaign_store, consumed) = self.campaign_store.unwrap_or_else(|| {
            let store = Arc::new(MemoryCampaignStore::new());
            let consumed: Arc<dyn ConsumedIndex> = store.clone();
            let campaigns: Arc<dyn CampaignStore> = store;
            (campaigns, consumed)
        });
        let trust_store: Arc<dyn TrustStore> = match self.trust_store {
            Some(store) => store,
            None => Arc::new(MemoryTrustStore::new()),
        };

        let verifier = Arc::new(PaymentVerifier::new(
            chain,
            consumed,
            PaymentVerifierConfig::from(&config.payment),
        ));

        let campaigns = Arc::new(
            CampaignService::new(
                campaign_store,
                verifier,
                config.payment.recipient.clone(),
                config.admin_key.clone(),
            )
            .with_events(events_tx.clone()),
        );
        let trust = Arc::new(TrustEngine::new(trust_store, config.trust.clone()));
        let notifier = Arc::new(
            WebhookNotifier::new(transport, &config.webhook).with_events(events_tx.clone()),
        );
        let submissions = Arc::new(
            SubmissionService::new(
                Arc::clone(&campaigns),
                Arc::clone(&trust),
                classifier,
                notifier,
                SubmissionSettings {
                    classifier: config.classifier.clone(),
                    fee_bps: config.settlement.fee_bps,
                    token_decimals: config.payment.token_decimals,
                },
            )
            .with_events(events_tx.clone()),
        );

        let negotiator = InvoiceNegotiator::new(&config.payment, config.referral.referrer_bps);
        let gateway = Arc::new(Gateway::new(negotiator, Arc::clone(&campaigns), submissions));

        Ok(RunningNode {
            config,
            gateway,
            campaigns,
            trust,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// A running attentium node.
pub struct RunningNode {
    config: ServiceConfig,
    gateway: Arc<Gateway>,
    campaigns: Arc<CampaignService>,
    trust: Arc<TrustEngine>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: NodeEventsSender,
    events_rx: Option<NodeEventsChannel>,
}

impl RunningNode {
    /// Configuration the node was built with.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Request handlers for the public endpoints.
    #[must_use]
    pub fn gateway(&self) -> Arc<Gateway> {
        Arc::clone(&self.gateway)
    }

    /// Campaign administration (`mark_failed`).
    #[must_use]
    pub fn campaigns(&self) -> Arc<CampaignService> {
        Arc::clone(&self.campaigns)
    }

    /// Trust administration (`standing`, `reset`).
    #[must_use]
    pub fn trust(&self) -> Arc<TrustEngine> {
        Arc::clone(&self.trust)
    }

    /// Get a receiver for node events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<NodeEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to node events.
    #[must_use]
    pub fn subscribe_events(&self) -> NodeEventsChannel {
        self.events_tx.subscribe()
    }

    /// Handle that stops the node from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    /// Serve the HTTP API until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the listen address cannot be bound or the
    /// listener fails.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting attentium-node");

        let mut log_rx = self.events_tx.subscribe();
        let mut log_shutdown = self.shutdown_rx.clone();
        let logger = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = log_shutdown.changed() => {
                        if *log_shutdown.borrow() {
                            break;
                        }
                    }
                    event = log_rx.recv() => match event {
                        Ok(event) => log_event(&event),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!("Event logger lagged, {missed} events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        let listener = TcpListener::bind(self.config.api.listen_addr).await?;
        let addr = listener.local_addr()?;
        let mut server = tokio::spawn(http::serve(
            listener,
            self.gateway(),
            self.shutdown_rx.clone(),
        ));

        let _ = self.events_tx.send(NodeEvent::Started);
        let _ = self.events_tx.send(NodeEvent::Listening { addr });
        info!("Node running on {addr}, waiting for shutdown signal");

        let mut served = None;
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    self.shutdown();
                    break;
                }
                result = &mut server => {
                    warn!("HTTP API exited before shutdown");
                    served = Some(result);
                    self.shutdown();
                    break;
                }
            }
        }

        let _ = self.events_tx.send(NodeEvent::ShuttingDown);
        let served = match served {
            Some(result) => result,
            None => server.await,
        };
        let _ = logger.await;

        match served {
            Ok(result) => result?,
            Err(e) => warn!("HTTP API task failed: {e}"),
        }
        info!("Node shutdown complete");
        Ok(())
    }

    /// Request the node to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Stops a [`RunningNode`] from outside its `run` loop.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Request the node to shut down.
    pub fn shutdown(&self) {
        let _ = self.0.send(true);
    }
}

fn log_event(event: &NodeEvent) {
    match event {
        NodeEvent::Started => info!("Node started"),
        NodeEvent::Listening { addr } => info!("HTTP API listening on {addr}"),
        NodeEvent::ShuttingDown => info!("Node shutting down"),
        NodeEvent::CampaignActivated { campaign_id, tx_hash } => {
            info!("Campaign {campaign_id} active (tx {tx_hash})");
        }
        NodeEvent::CampaignCompleted { campaign_id } => info!("Campaign {campaign_id} completed"),
        NodeEvent::PaymentRejected { tx_signature, reason } => {
            warn!("Payment {tx_signature} rejected: {reason}");
        }
        NodeEvent::ResponseAccepted {
            identity,
            campaign_id,
            quality,
        } => debug!("Response from {identity} accepted for {campaign_id:?} (quality {quality})"),
        NodeEvent::ResponseRejected { identity, quality } => {
            debug!("Response from {identity} rejected (quality {quality})");
        }
        NodeEvent::IdentityBanned { identity, quality } => {
            warn!("Identity {identity} banned (quality {quality})");
        }
        NodeEvent::WebhookFailed {
            campaign_id,
            message,
        } => warn!("Webhook for {campaign_id} failed: {message}"),
    }
}
