//! HTTP server for the query frontend.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::signal;

use super::handlers::{handle_healthy, handle_metrics, handle_query, handle_ready, AppState};
use super::metrics::Metrics;
use super::middleware::{MetricsLayer, TracingLayer};
use crate::config::FrontendConfig;
use crate::downstream::HttpDownstream;
use crate::frontend::SplitByDay;

/// HTTP server for the query frontend.
pub struct FrontendServer {
    frontend: Arc<SplitByDay>,
    downstream: Arc<HttpDownstream>,
    config: FrontendConfig,
}

impl FrontendServer {
    /// Create a new frontend server.
    pub fn new(
        frontend: Arc<SplitByDay>,
        downstream: Arc<HttpDownstream>,
        config: FrontendConfig,
    ) -> Self {
        Self {
            frontend,
            downstream,
            config,
        }
    }

    /// Run the HTTP server until SIGINT or SIGTERM.
    pub async fn run(self) {
        let metrics = Arc::new(Metrics::new());
        let state = AppState {
            frontend: self.frontend,
            downstream: self.downstream,
            metrics,
        };
        let app = router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        tracing::info!("Starting query frontend on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .unwrap();

        tracing::info!("Server shut down gracefully");
    }
}

/// Build the frontend router. The ops endpoints are served locally; every
/// other path goes through the catch-all query handler.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/-/healthy", get(handle_healthy))
        .route("/-/ready", get(handle_ready))
        .fallback(handle_query)
        .layer(TracingLayer::new())
        .layer(MetricsLayer::new(state.metrics.clone()))
        .with_state(state)
}

/// Listen for SIGTERM (K8s pod termination) and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
