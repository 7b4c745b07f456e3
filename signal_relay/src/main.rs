//! Signaling relay entry point

use clap::Parser;
use signal_relay::{RelayConfig, SignalingError};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "signal_relay=info";

#[tokio::main]
async fn main() -> Result<(), SignalingError> {
    let config = RelayConfig::parse();
    init_tracing(config.json_logs)?;

    tracing::info!("signal-relay v{} starting", env!("CARGO_PKG_VERSION"));

    signal_relay::serve(&config).await
}

fn init_tracing(json: bool) -> Result<(), SignalingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let result = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .try_init()
    };
    result.map_err(|err| SignalingError::Logging(err.to_string()))
}
