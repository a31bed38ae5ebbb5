// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Router assembly for the HTTP/SSE surface (spec §4.17).

mod classify;
mod health;
mod orchestrate;
mod security;
mod sessions;
mod signing;
mod stream;
mod swarm;

pub use signing::reap_expired_nonces;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/orchestrate", post(orchestrate::orchestrate))
        .route("/classify", post(classify::classify_message))
        .route("/stream/:session_id", get(stream::stream))
        .route("/swarm/launch", post(swarm::launch))
        .route("/swarm/status/:id", get(swarm::status))
        .route("/sessions", get(sessions::list).post(sessions::create))
        .route("/sessions/:session_id", get(sessions::get).delete(sessions::terminate))
        .route("/sessions/:session_id/messages", post(sessions::send_message))
        .layer(middleware::from_fn_with_state(state.clone(), signing::hmac_auth))
        .layer(middleware::from_fn(security::csrf_guard))
        .layer(middleware::from_fn(security::security_headers))
        .with_state(state)
}
