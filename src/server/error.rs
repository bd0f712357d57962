//! HTTP error mapping for the frontend server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::Error;

/// Error wrapper converting frontend errors to API error responses.
pub struct ApiError(pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self.0 {
            Error::InvalidTimestamp(_)
            | Error::InvalidDuration(_)
            | Error::DurationOverflow(_)
            | Error::EndBeforeStart
            | Error::NonPositiveStep
            | Error::TooManyPoints => (StatusCode::BAD_REQUEST, "bad_data"),
            // A downstream HTTP error keeps its status so clients see what
            // the query endpoint itself returned
            Error::Downstream {
                status: Some(status),
                ..
            } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "execution",
            ),
            Error::Downstream { status: None, .. } | Error::Cancelled => {
                (StatusCode::BAD_GATEWAY, "execution")
            }
            Error::UnexpectedValueType(_) | Error::UnexpectedResponseType | Error::Decode(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        let body = serde_json::json!({
            "status": "error",
            "errorType": error_type,
            "error": self.0.to_string()
        });

        (status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}
