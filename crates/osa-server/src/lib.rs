// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTTP/SSE surface (spec §4.17): orchestrate, classify, session and swarm
//! CRUD, health, and optional HMAC request signing.

mod error;
mod http;
mod state;

pub use error::AppError;
pub use http::{build_router, reap_expired_nonces};
pub use state::AppState;
