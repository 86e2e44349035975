//! Command-line interface definition.

use attentium_node::config::{find_config_file, ServiceConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Payment-gated human verification campaign node.
#[derive(Parser, Debug)]
#[command(name = "attentium-node")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, env = "ATTENTIUM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Treasury wallet receiving campaign payments.
    #[arg(long, env = "ATTENTIUM_RECIPIENT")]
    pub recipient: Option<String>,

    /// Solana JSON-RPC endpoint.
    #[arg(long, env = "ATTENTIUM_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Content classifier endpoint.
    #[arg(long, env = "ATTENTIUM_CLASSIFIER_URL")]
    pub classifier_url: Option<String>,

    /// Pre-shared admin credential.
    #[arg(long, env = "ATTENTIUM_ADMIN_KEY", hide_env_values = true)]
    pub admin_key: Option<String>,

    /// Referrer share in basis points.
    #[arg(long, env = "ATTENTIUM_REFERRER_BPS")]
    pub referrer_bps: Option<u16>,

    /// Address the HTTP API listens on.
    #[arg(long, env = "ATTENTIUM_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log level; the config file's `log_level` applies when unset.
    /// `RUST_LOG` still takes precedence over both.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Convert CLI arguments into a `ServiceConfig`.
    ///
    /// The file named by `--config` is loaded first, else the first existing
    /// file from [`find_config_file`]; flags override both.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be loaded or the result is
    /// invalid.
    pub fn into_config(self) -> color_eyre::Result<ServiceConfig> {
        let path = self.config.or_else(find_config_file);

        let mut config = match path {
            Some(ref path) => ServiceConfig::from_file(path)?,
            None => ServiceConfig::default(),
        };

        if let Some(recipient) = self.recipient {
            config.payment.recipient = recipient;
        }
        if let Some(rpc_url) = self.rpc_url {
            config.payment.rpc_url = rpc_url;
        }
        if let Some(endpoint) = self.classifier_url {
            config.classifier.endpoint = Some(endpoint);
        }
        if let Some(admin_key) = self.admin_key {
            config.admin_key = Some(admin_key);
        }
        if let Some(bps) = self.referrer_bps {
            config.referral.referrer_bps = bps;
        }
        if let Some(listen) = self.listen {
            config.api.listen_addr = listen;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }
}
