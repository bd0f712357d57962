//! HTTP route handlers for the frontend server.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;

use super::error::ApiError;
use super::metrics::Metrics;
use super::request::{RangeParams, RangeQuery};
use super::response::QueryRangeResponse;
use crate::downstream::HttpDownstream;
use crate::error::Error;
use crate::frontend::SplitByDay;
use crate::split::split_by_day;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub frontend: Arc<SplitByDay>,
    pub downstream: Arc<HttpDownstream>,
    pub metrics: Arc<Metrics>,
}

/// Catch-all handler: paths ending in `/query_range` enter the splitting
/// pipeline, everything else is forwarded to the downstream unchanged.
pub async fn handle_query(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError> {
    if uri.path().ends_with("/query_range") {
        let response = handle_query_range(state, uri).await?;
        Ok(response.into_response())
    } else {
        handle_passthrough(state, method, uri, body).await
    }
}

async fn handle_query_range(
    state: AppState,
    uri: Uri,
) -> Result<Json<QueryRangeResponse>, ApiError> {
    // A malformed query string is treated like missing parameters; the
    // validation below produces the precise error
    let params: RangeParams =
        serde_urlencoded::from_str(uri.query().unwrap_or("")).unwrap_or_default();
    let query = RangeQuery::from_params(uri.path(), &params)?;

    state.metrics.split_queries_total.inc();
    state
        .metrics
        .split_subqueries
        .observe(split_by_day(&query).len() as f64);

    let result = state.frontend.query_range(query).await.map_err(|err| {
        if matches!(err, Error::Downstream { .. }) {
            state.metrics.downstream_errors_total.inc();
        }
        ApiError(err)
    })?;

    Ok(Json(QueryRangeResponse::success(result)))
}

async fn handle_passthrough(
    state: AppState,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let proxied = state.downstream.proxy(method, path_and_query, body).await?;

    let mut response = Response::builder().status(
        StatusCode::from_u16(proxied.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    );
    if let Some(content_type) = proxied.content_type {
        response = response.header(header::CONTENT_TYPE, content_type);
    }
    response
        .body(Body::from(proxied.body))
        .map_err(|e| ApiError(Error::Decode(e.to_string())))
}

/// Handle GET /metrics
pub async fn handle_metrics(State(state): State<AppState>) -> String {
    state.metrics.encode()
}

/// Handle GET /-/healthy
pub async fn handle_healthy() -> StatusCode {
    StatusCode::OK
}

/// Handle GET /-/ready
pub async fn handle_ready() -> StatusCode {
    StatusCode::OK
}
