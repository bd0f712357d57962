//! HTTP middleware for the frontend server.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use tower::{Layer, Service};

use super::metrics::{HttpLabels, HttpLabelsWithStatus, HttpMethod, Metrics};

/// Decrements the in-flight gauge on drop, so the gauge recovers even when
/// a request future is cancelled mid-flight.
struct InFlightGuard {
    metrics: Arc<Metrics>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics.http_requests_in_flight.dec();
    }
}

/// Layer that records request count, latency, and in-flight gauge.
#[derive(Clone)]
pub struct MetricsLayer {
    metrics: Arc<Metrics>,
}

impl MetricsLayer {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

/// Service that collects HTTP metrics.
#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    metrics: Arc<Metrics>,
}

impl<S, ResBody> Service<Request<Body>> for MetricsService<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ResBody: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let method = HttpMethod::from(request.method());
        let endpoint = endpoint_label(request.uri().path());
        let metrics = self.metrics.clone();

        metrics.http_requests_in_flight.inc();
        let guard = InFlightGuard {
            metrics: metrics.clone(),
        };
        let started = Instant::now();
        let future = self.inner.call(request);

        Box::pin(async move {
            let _guard = guard;
            let response = future.await?;
            let status = response.status().as_u16();

            metrics
                .http_requests_total
                .get_or_create(&HttpLabelsWithStatus {
                    method: method.clone(),
                    endpoint: endpoint.clone(),
                    status,
                })
                .inc();
            metrics
                .http_request_duration_seconds
                .get_or_create(&HttpLabels { method, endpoint })
                .observe(started.elapsed().as_secs_f64());

            Ok(response)
        })
    }
}

/// Endpoint label with bounded cardinality: the frontend forwards arbitrary
/// paths to the downstream, so everything that is not a known local route
/// collapses into either the range-query label or a single proxy label.
fn endpoint_label(path: &str) -> String {
    if path.ends_with("/query_range") {
        "/query_range".to_string()
    } else {
        match path {
            "/metrics" | "/-/healthy" | "/-/ready" => path.to_string(),
            _ => "proxy".to_string(),
        }
    }
}

/// Layer that logs requests and responses at debug level.
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

/// Service that logs HTTP requests and responses.
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S, ResBody> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ResBody: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let method = request.method().clone();
        let uri = request.uri().clone();

        tracing::debug!(method = %method, uri = %uri, "request received");

        let started = Instant::now();
        let future = self.inner.call(request);

        Box::pin(async move {
            let response = future.await?;
            tracing::debug!(
                method = %method,
                uri = %uri,
                status = response.status().as_u16(),
                duration_ms = started.elapsed().as_millis() as u64,
                "request completed"
            );
            Ok(response)
        })
    }
}
