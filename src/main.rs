//! Query frontend binary entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use query_frontend::{CliArgs, FrontendConfig, FrontendServer, HttpDownstream, SplitByDay};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    let config = FrontendConfig::from(&args);

    tracing::info!(
        "Splitting range queries at day boundaries, downstream at {}",
        config.downstream_url
    );

    let downstream = Arc::new(HttpDownstream::new(config.downstream_url.clone()));
    let frontend = Arc::new(SplitByDay::new(downstream.clone()));

    let server = FrontendServer::new(frontend, downstream, config);
    server.run().await;
}
