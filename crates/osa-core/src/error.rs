// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Error kinds (spec §7): one variant per documented error kind, so every
//! HTTP/SSE surface (`osa-server`) and CLI exit path maps from a single
//! enum rather than ad-hoc string matching.

use thiserror::Error;

/// One variant per error kind named in spec §7.
#[derive(Debug, Error)]
pub enum OsaError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("tool error: {0}")]
    ToolError(String),

    #[error("tool blocked: {0}")]
    ToolBlocked(String),

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("iteration cap reached after {0} iterations")]
    IterationCap(u32),

    #[error("consecutive failure cap reached ({0} failures of the same tool)")]
    ConsecutiveFailureCap(u32),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl OsaError {
    /// A short machine-readable tag, used as the JSON envelope's `error` field
    /// and by the CLI to select an exit code.
    pub fn tag(&self) -> &'static str {
        match self {
            OsaError::InvalidRequest(_) => "invalid_request",
            OsaError::Validation(_) => "validation",
            OsaError::Unauthorized => "unauthorized",
            OsaError::RateLimited => "rate_limited",
            OsaError::ProviderError(_) => "provider_error",
            OsaError::ToolError(_) => "tool_error",
            OsaError::ToolBlocked(_) => "tool_blocked",
            OsaError::BudgetExceeded(_) => "budget_exceeded",
            OsaError::IterationCap(_) => "iteration_cap",
            OsaError::ConsecutiveFailureCap(_) => "consecutive_failure_cap",
            OsaError::Cancelled => "cancelled",
            OsaError::Internal(_) => "internal",
        }
    }

    /// CLI exit code per spec §6: 0 ok, 1 user error, 2 config error, 3
    /// provider unreachable. Errors that don't cleanly map (tool/budget/
    /// cancellation) are treated as user errors, matching the teacher's
    /// preference for a small, documented exit-code surface over one code
    /// per variant.
    pub fn exit_code(&self) -> i32 {
        match self {
            OsaError::InvalidRequest(_) | OsaError::Validation(_) => 1,
            OsaError::Unauthorized => 1,
            OsaError::RateLimited | OsaError::ProviderError(_) => 3,
            _ => 1,
        }
    }
}
