//! attentium-node CLI entry point.

mod cli;

use attentium_node::NodeBuilder;
use clap::Parser;
use cli::Cli;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let config = Cli::parse().into_config()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("attentium-node v{}", env!("CARGO_PKG_VERSION"));

    let mut node = NodeBuilder::new(config).build().await?;
    node.run().await?;

    info!("Goodbye!");
    Ok(())
}
