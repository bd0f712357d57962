//! Downstream execution of individual range queries.

use async_trait::async_trait;
use axum::http::Method;
use bytes::Bytes;
use reqwest::Client;

use crate::error::{Error, Result};
use crate::server::request::RangeQuery;
use crate::server::response::{self, QueryRangeResult};

/// A transport capable of executing one (already-split) range query.
///
/// The fan-out executor depends only on this trait, so tests inject
/// deterministic stubs in place of a live endpoint.
#[async_trait]
pub trait QueryRange: Send + Sync {
    async fn query_range(&self, query: RangeQuery) -> Result<QueryRangeResult>;
}

/// A response forwarded verbatim from the downstream.
#[derive(Debug)]
pub struct ProxiedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Executes range queries against a downstream query endpoint over HTTP.
pub struct HttpDownstream {
    client: Client,
    base_url: String,
}

impl HttpDownstream {
    /// Create a downstream transport for the endpoint at `base_url`
    /// (scheme and authority, no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Forward a request that is not a range query to the downstream
    /// unchanged, returning its response as-is.
    pub async fn proxy(
        &self,
        method: Method,
        path_and_query: &str,
        body: Bytes,
    ) -> Result<ProxiedResponse> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let response = self
            .client
            .request(method, &url)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(transport_error)?;

        Ok(ProxiedResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl QueryRange for HttpDownstream {
    async fn query_range(&self, query: RangeQuery) -> Result<QueryRangeResult> {
        let url = format!("{}{}", self.base_url, query.to_uri());
        let http_response = self.client.get(&url).send().await.map_err(transport_error)?;

        let status = http_response.status();
        let body = http_response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(Error::Downstream {
                status: Some(status.as_u16()),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let envelope = response::decode(&body)?;
        if envelope.status != "success" {
            return Err(Error::Downstream {
                status: None,
                message: envelope
                    .error
                    .unwrap_or_else(|| "downstream reported an error without a message".to_string()),
            });
        }
        envelope
            .data
            .ok_or_else(|| Error::Decode("success response carries no data".to_string()))
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    Error::Downstream {
        status: None,
        message: err.to_string(),
    }
}
