// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Optional HMAC request signing (spec §4.17): when `require_auth` is set,
//! every request must carry `X-OSA-Signature: hex(HMAC-SHA256(secret,
//! timestamp || nonce || body))`, `X-OSA-Timestamp` (within
//! `auth_window_secs`), and `X-OSA-Nonce` (rejected if seen within
//! `nonce_reap_secs`). Signature comparison is constant-time.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

pub async fn hmac_auth(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    if !state.config.server.require_auth {
        return next.run(req).await;
    }
    match verify(&state, req).await {
        Ok(req) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

fn header_str(parts: &Parts, name: &str) -> Option<String> {
    parts.headers.get(name)?.to_str().ok().map(str::to_string)
}

async fn verify(state: &AppState, req: Request) -> Result<Request, AppError> {
    let (parts, body) = req.into_parts();

    let signature =
        header_str(&parts, "x-osa-signature").ok_or_else(|| AppError::unauthorized("missing X-OSA-Signature"))?;
    let timestamp =
        header_str(&parts, "x-osa-timestamp").ok_or_else(|| AppError::unauthorized("missing X-OSA-Timestamp"))?;
    let nonce = header_str(&parts, "x-osa-nonce").ok_or_else(|| AppError::unauthorized("missing X-OSA-Nonce"))?;

    let ts: i64 = timestamp.parse().map_err(|_| AppError::unauthorized("malformed X-OSA-Timestamp"))?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > state.config.server.auth_window_secs {
        return Err(AppError::unauthorized("timestamp outside allowed window"));
    }

    if state.seen_nonces.contains_key(&nonce) {
        return Err(AppError::unauthorized("nonce already used"));
    }

    let secret = state
        .config
        .server
        .hmac_secret
        .as_deref()
        .ok_or_else(|| AppError::internal("require_auth is set but no hmac_secret is configured"))?;

    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| AppError::invalid_request(format!("failed to read request body: {e}")))?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::internal(format!("bad hmac key: {e}")))?;
    mac.update(timestamp.as_bytes());
    mac.update(nonce.as_bytes());
    mac.update(&body_bytes);
    let expected = hex::encode(mac.finalize().into_bytes());

    let matches: bool = expected.as_bytes().ct_eq(signature.as_bytes()).into();
    if !matches {
        return Err(AppError::unauthorized("signature mismatch"));
    }

    state.seen_nonces.insert(nonce, chrono::Utc::now());

    Ok(Request::from_parts(parts, Body::from(body_bytes)))
}

/// Drop nonces older than `nonce_reap_secs`. Run on a timer alongside the
/// server (spec §4.17: "nonce table reaped on that interval").
pub fn reap_expired_nonces(state: &AppState) {
    let cutoff = chrono::Utc::now() - chrono::Duration::seconds(state.config.server.nonce_reap_secs as i64);
    state.seen_nonces.retain(|_, seen_at| *seen_at > cutoff);
}
