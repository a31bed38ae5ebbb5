// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Top-level error handling (spec §4.17): internal crashes are caught and
//! returned as `500 {error, details}` — never an empty body with
//! `connection: close`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// A request-handling failure, carrying the status code it should surface
/// as. Handlers return `Result<T, AppError>`; `?` on an `anyhow::Error`
/// degrades to a 500 via the `From` impl below, satisfying "internal
/// crashes must be caught by a top-level error handler".
pub struct AppError {
    status: StatusCode,
    error: &'static str,
    details: String,
}

impl AppError {
    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: "invalid_request", details: details.into() }
    }

    pub fn invalid_pattern(details: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: "invalid_pattern", details: details.into() }
    }

    pub fn not_found(details: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, error: "not_found", details: details.into() }
    }

    pub fn unauthorized(details: impl Into<String>) -> Self {
        Self { status: StatusCode::UNAUTHORIZED, error: "unauthorized", details: details.into() }
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: "internal_error", details: details.into() }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.error, "details": self.details}))).into_response()
    }
}
