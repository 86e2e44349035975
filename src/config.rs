//! Configuration for attentium-node.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Mainnet USDC mint.
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Basis-point denominator.
pub const MAX_BPS: u16 = 10_000;

/// Config file installed by the Debian package.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/attentium/config.toml";

/// Port the HTTP API listens on by default.
pub const DEFAULT_API_PORT: u16 = 8402;

/// Fewest calls a retried collaborator gets: the first try and one retry.
pub const MIN_ATTEMPTS: u32 = 2;

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP API listener.
    #[serde(default)]
    pub api: ApiConfig,

    /// Escrow payment configuration.
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Referral revenue share.
    #[serde(default)]
    pub referral: ReferralConfig,

    /// Trust/quality engine constants.
    #[serde(default)]
    pub trust: TrustConfig,

    /// Content classifier collaborator.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Outbound webhook delivery.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Worker settlement.
    #[serde(default)]
    pub settlement: SettlementConfig,

    /// Pre-shared credential enabling admin campaign creation.
    /// Admin creation is disabled when unset.
    #[serde(default)]
    pub admin_key: Option<String>,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP API listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Socket address to bind.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

/// Escrow payment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Chain name advertised in invoices.
    #[serde(default = "default_chain")]
    pub chain: String,

    /// Token symbol advertised in invoices.
    #[serde(default = "default_token")]
    pub token: String,

    /// SPL mint of the payment token.
    #[serde(default = "default_token_mint")]
    pub token_mint: String,

    /// Decimal places of the payment token.
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,

    /// Treasury address receiving escrow payments.
    #[serde(default)]
    pub recipient: String,

    /// JSON-RPC endpoint of the chain.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Lookup attempts before surfacing `NotFinalized` or unavailability.
    #[serde(default = "default_payment_attempts")]
    pub max_attempts: u32,

    /// First retry delay in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on a single retry delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-request RPC timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Capacity of the consumed-signature LRU cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Referral revenue share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfig {
    /// Referrer share in basis points (2000 = 20%).
    #[serde(default = "default_referrer_bps")]
    pub referrer_bps: u16,
}

/// Trust/quality engine constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Quality assigned on first sight.
    #[serde(default = "default_initial_quality")]
    pub initial_quality: i64,

    /// Identities strictly below this score are banned.
    #[serde(default = "default_ban_threshold")]
    pub ban_threshold: i64,

    /// Delta for an accepted answer.
    #[serde(default = "default_reward")]
    pub reward: i64,

    /// Delta for a rejected answer (applied as a subtraction).
    #[serde(default = "default_penalty")]
    pub penalty: i64,

    /// Idle time that costs one quality point, in milliseconds.
    #[serde(default = "default_decay_interval_ms")]
    pub decay_interval_ms: i64,

    /// Compare-and-swap attempts before reporting contention.
    #[serde(default = "default_cas_attempts")]
    pub max_update_attempts: u32,
}

/// Content classifier collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// HTTP endpoint answering relevance checks.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Attempts before surfacing unavailability.
    #[serde(default = "default_classifier_attempts")]
    pub max_attempts: u32,

    /// First retry delay in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Outbound webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Header carrying `sha256=<hex>`.
    #[serde(default = "default_signature_header")]
    pub signature_header: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Worker settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Platform fee taken from each payout, in basis points.
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            payment: PaymentConfig::default(),
            referral: ReferralConfig::default(),
            trust: TrustConfig::default(),
            classifier: ClassifierConfig::default(),
            webhook: WebhookConfig::default(),
            settlement: SettlementConfig::default(),
            admin_key: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            token: default_token(),
            token_mint: default_token_mint(),
            token_decimals: default_token_decimals(),
            recipient: String::new(),
            rpc_url: default_rpc_url(),
            max_attempts: default_payment_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_secs: default_request_timeout(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            referrer_bps: default_referrer_bps(),
        }
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            initial_quality: default_initial_quality(),
            ban_threshold: default_ban_threshold(),
            reward: default_reward(),
            penalty: default_penalty(),
            decay_interval_ms: default_decay_interval_ms(),
            max_update_attempts: default_cas_attempts(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_attempts: default_classifier_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signature_header: default_signature_header(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            fee_bps: default_fee_bps(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_API_PORT))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_chain() -> String {
    "solana".to_string()
}

fn default_token() -> String {
    "USDC".to_string()
}

fn default_token_mint() -> String {
    USDC_MINT.to_string()
}

const fn default_token_decimals() -> u32 {
    6
}

fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

const fn default_payment_attempts() -> u32 {
    5
}

const fn default_classifier_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    4_000
}

const fn default_request_timeout() -> u64 {
    10
}

const fn default_cache_capacity() -> usize {
    100_000
}

const fn default_referrer_bps() -> u16 {
    2_000
}

const fn default_initial_quality() -> i64 {
    50
}

const fn default_ban_threshold() -> i64 {
    20
}

const fn default_reward() -> i64 {
    1
}

const fn default_penalty() -> i64 {
    10
}

const fn default_decay_interval_ms() -> i64 {
    24 * 60 * 60 * 1000 // 1 day
}

const fn default_cas_attempts() -> u32 {
    16
}

fn default_signature_header() -> String {
    "X-Attentium-Signature".to_string()
}

const fn default_fee_bps() -> u16 {
    1_000
}

/// Platform default location of the per-user config file.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "attentium")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Config files in lookup order: the per-user file, then the system file.
#[must_use]
pub fn config_search_paths() -> Vec<PathBuf> {
    default_config_path()
        .into_iter()
        .chain(std::iter::once(PathBuf::from(SYSTEM_CONFIG_PATH)))
        .collect()
}

/// First config file from [`config_search_paths`] that exists.
#[must_use]
pub fn find_config_file() -> Option<PathBuf> {
    config_search_paths().into_iter().find(|path| path.exists())
}

impl PaymentConfig {
    /// Retry policy for chain lookups.
    #[must_use]
    pub fn backoff(&self) -> backoff::ExponentialBackoff {
        retry_policy(self.initial_backoff_ms, self.max_backoff_ms)
    }
}

impl ClassifierConfig {
    /// Retry policy for classifier calls.
    #[must_use]
    pub fn backoff(&self) -> backoff::ExponentialBackoff {
        retry_policy(self.initial_backoff_ms, self.initial_backoff_ms.saturating_mul(8))
    }
}

/// Attempts are bounded by the callers; the policy itself never gives up on time.
fn retry_policy(initial_ms: u64, max_ms: u64) -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoff {
        initial_interval: Duration::from_millis(initial_ms),
        max_interval: Duration::from_millis(max_ms.max(initial_ms)),
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the services cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.payment.recipient.trim().is_empty() {
            return Err(Error::Config("payment.recipient must be set".to_string()));
        }
        if self.payment.token_decimals > 18 {
            return Err(Error::Config(format!(
                "payment.token_decimals {} exceeds 18",
                self.payment.token_decimals
            )));
        }
        if self.payment.max_attempts < MIN_ATTEMPTS || self.classifier.max_attempts < MIN_ATTEMPTS {
            return Err(Error::Config(format!(
                "payment.max_attempts and classifier.max_attempts must be at least {MIN_ATTEMPTS}"
            )));
        }
        if self.referral.referrer_bps > MAX_BPS {
            return Err(Error::Config(format!(
                "referral.referrer_bps {} exceeds {MAX_BPS}",
                self.referral.referrer_bps
            )));
        }
        if self.settlement.fee_bps > MAX_BPS {
            return Err(Error::Config(format!(
                "settlement.fee_bps {} exceeds {MAX_BPS}",
                self.settlement.fee_bps
            )));
        }
        if self.trust.decay_interval_ms <= 0 {
            return Err(Error::Config(
                "trust.decay_interval_ms must be positive".to_string(),
            ));
        }
        if self.trust.max_update_attempts == 0 {
            return Err(Error::Config(
                "trust.max_update_attempts must be at least 1".to_string(),
            ));
        }
        if matches!(self.admin_key.as_deref(), Some(key) if key.len() < 16) {
            return Err(Error::Config(
                "admin_key must be at least 16 characters".to_string(),
            ));
        }
        Ok(())
    }
}
