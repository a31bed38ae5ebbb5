// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `POST /orchestrate` (spec §4.17): run one full turn through the agent
//! loop for a session, creating the session if it doesn't exist yet.
//!
//! Noise is short-circuited before the agent loop is ever touched: a
//! message the Tier-1 filter classifies as noise returns the canned reply
//! directly, with `tools_used=[]` and `iteration_count=0`, and no session
//! loop is created for it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, Json};
use osa_core::{classify, tier1, AgentEvent, FilterOutcome, LoopReply};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrchestrateRequest {
    pub input: String,
    pub session_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrchestrateResponse {
    pub output: String,
    pub signal: osa_core::Signal,
    pub tools_used: Vec<String>,
    pub iteration_count: usize,
    pub execution_ms: u64,
    pub session_id: String,
}

pub async fn orchestrate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrchestrateRequest>,
) -> Result<Json<OrchestrateResponse>, AppError> {
    if req.input.trim().is_empty() {
        return Err(AppError::invalid_request("input must not be empty"));
    }

    let start = Instant::now();
    let channel = req.channel.as_deref().unwrap_or("http");
    let session_id = req.session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = tier1(&req.input, None, None, Duration::from_secs(120));
    if let FilterOutcome::Noise { canned_reply, .. } = outcome {
        let signal = classify(&req.input, channel, 0.0, chrono::Utc::now().to_rfc3339());
        return Ok(Json(OrchestrateResponse {
            output: canned_reply.unwrap_or_default().to_string(),
            signal,
            tools_used: Vec::new(),
            iteration_count: 0,
            execution_ms: start.elapsed().as_millis() as u64,
            session_id,
        }));
    }

    if !state.sessions.whereis(&session_id) {
        let agent = state.build_agent(channel)?;
        state.sessions.ensure_loop(&session_id, agent).await;
    }

    let weight = match outcome {
        FilterOutcome::Signal { weight } => weight,
        FilterOutcome::Noise { .. } => unreachable!("noise outcomes return early above"),
    };
    let signal = classify(&req.input, channel, weight, chrono::Utc::now().to_rfc3339());

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
    let collect = tokio::spawn(async move {
        let mut output = String::new();
        let mut tools_used = Vec::new();
        let mut iteration_count = 0usize;
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::TextComplete(t) => output = t,
                AgentEvent::ToolCallStarted(call) => {
                    tools_used.push(call.name.clone());
                    iteration_count += 1;
                }
                AgentEvent::Error(e) => tracing::warn!(error = %e, "agent reported an error during /orchestrate"),
                _ => {}
            }
        }
        (output, tools_used, iteration_count)
    });

    let reply = state
        .sessions
        .process_message(&session_id, req.input, tx)
        .await
        .map_err(AppError::from)?;

    if matches!(reply, LoopReply::Busy) {
        collect.abort();
        return Err(AppError::invalid_request("session is already processing a turn"));
    }

    let (output, tools_used, iteration_count) =
        collect.await.map_err(|e| AppError::internal(format!("event collector panicked: {e}")))?;

    state.bus.publish(
        osa_core::EventTag::SignalClassified,
        serde_json::json!({ "session_id": session_id, "signal": signal }),
    );

    Ok(Json(OrchestrateResponse {
        output,
        signal,
        tools_used,
        iteration_count,
        execution_ms: start.elapsed().as_millis() as u64,
        session_id,
    }))
}
