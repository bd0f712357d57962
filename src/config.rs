//! Configuration for the query frontend.

use clap::Parser;

/// CLI arguments for the frontend server.
#[derive(Parser, Debug)]
#[command(name = "query-frontend")]
#[command(about = "Day-splitting frontend for range queries")]
pub struct CliArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "QUERY_FRONTEND_PORT")]
    pub port: u16,

    /// Base URL of the downstream query endpoint, e.g. http://querier:9090
    #[arg(short, long, env = "QUERY_FRONTEND_DOWNSTREAM")]
    pub downstream: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct FrontendConfig {
    /// Port the HTTP server listens on.
    pub port: u16,

    /// Base URL of the downstream query endpoint. Range queries are split
    /// and fanned out against it; everything else is proxied to it.
    pub downstream_url: String,
}

impl From<&CliArgs> for FrontendConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            port: args.port,
            downstream_url: args.downstream.clone(),
        }
    }
}
