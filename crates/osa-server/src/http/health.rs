// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `GET /health` (spec §4.17): `{status, version, provider, model}` — the
//! provider/model fields must reflect the actually-active provider, never
//! an unrelated configured default.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub uptime_secs: i64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let primary = state.providers.primary();
    Json(HealthResponse {
        status: if primary.is_some() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        provider: primary.as_ref().map(|p| p.name().to_string()),
        model: primary.as_ref().map(|p| p.model_name().to_string()),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}
