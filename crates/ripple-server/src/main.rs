//! Ripple server entry point.

use anyhow::Result;
use ripple_server::{config::Config, handlers, metrics};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripple=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ripple server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("Configuration loaded: {:?}", config);

    metrics::init_metrics();

    handlers::run_server(config).await
}
