// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Session CRUD + message dispatch (spec §4.17, §4.11).
//!
//! The registry only tracks `session_id -> loop process`; it doesn't expose
//! turn history, so `get` reports existence and `messages` is the same
//! single-turn dispatch `/orchestrate` uses, just addressed by path instead
//! of body.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use osa_core::{AgentEvent, LoopReply};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub channel: Option<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionView>, AppError> {
    let session_id = Uuid::new_v4().to_string();
    let channel = req.channel.as_deref().unwrap_or("http");
    let agent = state.build_agent(channel)?;
    state.sessions.ensure_loop(&session_id, agent).await;
    Ok(Json(SessionView { session_id }))
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<SessionView>> {
    Json(
        state
            .sessions
            .list()
            .into_iter()
            .map(|session_id| SessionView { session_id })
            .collect(),
    )
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    if !state.sessions.whereis(&session_id) {
        return Err(AppError::not_found(format!("session {session_id} not found")));
    }
    Ok(Json(SessionView { session_id }))
}

pub async fn terminate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<(), AppError> {
    if !state.sessions.terminate(&session_id) {
        return Err(AppError::not_found(format!("session {session_id} not found")));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub output: String,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    if req.input.trim().is_empty() {
        return Err(AppError::invalid_request("input must not be empty"));
    }
    if !state.sessions.whereis(&session_id) {
        return Err(AppError::not_found(format!("session {session_id} not found")));
    }

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
    let collect = tokio::spawn(async move {
        let mut output = String::new();
        while let Some(event) = rx.recv().await {
            if let AgentEvent::TextComplete(t) = event {
                output = t;
            }
        }
        output
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

    let output = collect.await.map_err(|e| AppError::internal(format!("event collector panicked: {e}")))?;
    Ok(Json(SendMessageResponse { output }))
}
