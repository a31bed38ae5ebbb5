// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `POST /swarm/launch` and `GET /swarm/status/:id` (spec §4.17, §4.14).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use osa_planner::Pattern;
use osa_swarm::{SwarmError, SwarmStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    pub task: String,
    /// Raw JSON so an unrecognized pattern string surfaces as
    /// `invalid_pattern` rather than axum's generic body-parse 400
    /// (spec §4.17: "silent fallback is forbidden").
    #[serde(default)]
    pub pattern: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct LaunchResponse {
    pub swarm_id: String,
}

const VALID_PATTERNS: &[&str] = &["parallel", "pipeline", "debate", "review"];

fn parse_pattern(value: &Value) -> Result<Pattern, AppError> {
    serde_json::from_value(value.clone())
        .map_err(|_| AppError::invalid_pattern(format!("Valid patterns: {}", VALID_PATTERNS.join(", "))))
}

pub async fn launch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LaunchRequest>,
) -> Result<Json<LaunchResponse>, AppError> {
    if req.task.trim().is_empty() {
        return Err(AppError::invalid_request("task must not be empty"));
    }

    let pattern = req.pattern.as_ref().map(parse_pattern).transpose()?;

    let provider = state
        .providers
        .primary()
        .ok_or_else(|| AppError::internal("no reachable model provider"))?;

    let swarm_id = state
        .swarm
        .launch(provider, req.task, pattern)
        .await
        .map_err(|e| match e {
            SwarmError::TooManySwarms(max) => {
                AppError::invalid_request(format!("too many concurrent swarms (max {max})"))
            }
            SwarmError::NotFound(id) => AppError::not_found(format!("swarm {id} not found")),
        })?;

    Ok(Json(LaunchResponse { swarm_id }))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(swarm_id): Path<String>,
) -> Result<Json<SwarmStatus>, AppError> {
    state
        .swarm
        .status(&swarm_id)
        .await
        .map(Json)
        .map_err(|e| match e {
            SwarmError::NotFound(id) => AppError::not_found(format!("swarm {id} not found")),
            SwarmError::TooManySwarms(max) => {
                AppError::internal(format!("unexpected too-many-swarms error (max {max})"))
            }
        })
}
