// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `GET /stream/:session_id` (spec §4.17): multiplex the event bus as SSE,
//! filtered to events carrying this `session_id` — events with no
//! `session_id` field (e.g. `swarm_progress`) are process-wide and pass
//! through to every stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;

use crate::state::AppState;

fn matches(data: &serde_json::Value, session_id: &str) -> bool {
    match data.get("session_id").and_then(|v| v.as_str()) {
        Some(id) => id == session_id,
        None => true,
    }
}

pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (_handle, rx) = state.bus.subscribe();

    let connected_id = session_id.clone();
    let connected = stream::once(async move {
        Ok(SseEvent::default()
            .event("connected")
            .data(serde_json::json!({ "session_id": connected_id }).to_string()))
    });

    let filtered_id = session_id.clone();
    let body = ReceiverStream::new(rx).filter_map(move |event| {
        let include = matches(&event.data, &filtered_id);
        async move {
            include.then(|| Ok(SseEvent::default().event(event.tag.as_str()).data(event.data.to_string())))
        }
    });

    Sse::new(connected.chain(body)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(state.config.server.sse_keepalive_secs))
            .text("keep-alive"),
    )
}
