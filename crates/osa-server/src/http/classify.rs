// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `POST /classify` (spec §4.17): run the signal classifier (and the
//! deterministic Tier-1 noise gate) over a message without touching the
//! agent loop.
//!
//! This endpoint only runs Tier 1 of the noise filter — it has no session
//! history to check dedup against and no Tier-2 LLM callback to invoke, so
//! `last_user_message`/`last_message_age` are always `None`. This is a
//! documented simplification, not a faithful reproduction of the in-session
//! gate used by `/orchestrate`.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, Json};
use osa_core::{classify, tier1, FilterOutcome, Signal};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub message: String,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub signal: Signal,
    pub noise: bool,
    pub noise_reason: Option<&'static str>,
}

pub async fn classify_message(
    State(_state): State<Arc<AppState>>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let channel = req.channel.as_deref().unwrap_or("http");

    let outcome = tier1(&req.message, None, None, Duration::from_secs(120));
    let (noise, noise_reason, weight) = match outcome {
        FilterOutcome::Noise { reason, .. } => (true, Some(reason), 0.0),
        FilterOutcome::Signal { weight } => (false, None, weight),
    };

    let signal = classify(&req.message, channel, weight, chrono::Utc::now().to_rfc3339());

    Ok(Json(ClassifyResponse { signal, noise, noise_reason }))
}
