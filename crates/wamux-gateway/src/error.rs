// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`WamuxError`] to HTTP responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use wamux_core::WamuxError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// A [`WamuxError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub WamuxError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            WamuxError::NotFound { .. } => StatusCode::NOT_FOUND,
            WamuxError::AlreadyAuthenticated | WamuxError::InvalidState(_) => StatusCode::CONFLICT,
            WamuxError::InvalidInput(_) | WamuxError::Config(_) => StatusCode::BAD_REQUEST,
            WamuxError::Unauthorized => StatusCode::UNAUTHORIZED,
            WamuxError::Forbidden(_) => StatusCode::FORBIDDEN,
            WamuxError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            WamuxError::Transport { .. } => StatusCode::BAD_GATEWAY,
            WamuxError::Storage { .. } | WamuxError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<WamuxError> for ApiError {
    fn from(e: WamuxError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(WamuxError::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (WamuxError::session_not_found("+15550001111"), StatusCode::NOT_FOUND),
            (WamuxError::AlreadyAuthenticated, StatusCode::CONFLICT),
            (WamuxError::InvalidState("busy".into()), StatusCode::CONFLICT),
            (WamuxError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (WamuxError::Unauthorized, StatusCode::UNAUTHORIZED),
            (WamuxError::Forbidden("other tenant".into()), StatusCode::FORBIDDEN),
            (
                WamuxError::Timeout {
                    duration: Duration::from_secs(60),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (WamuxError::transport("bridge down"), StatusCode::BAD_GATEWAY),
            (
                WamuxError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError(error).status(), expected);
        }
    }

    #[test]
    fn error_response_serializes() {
        let resp = ErrorResponse {
            error: "session not found: +15550001111".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"error":"session not found: +15550001111"}"#);
    }
}
