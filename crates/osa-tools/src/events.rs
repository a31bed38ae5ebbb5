// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Side-channel events emitted by stateful tools.
//!
//! `TodoWriteTool` and `SwitchModeTool` hold state (the todo list, the
//! active mode) that the agent loop needs to mirror into its own
//! `AgentEvent` stream. Rather than giving every tool a back-channel into
//! `osa-core`, these two tools push onto a plain `mpsc::Sender<ToolEvent>`
//! that the agent drains once per round (see `Agent::drain_tool_events`).

use osa_config::AgentMode;
use serde::{Deserialize, Serialize};

/// One entry in the agent's todo list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub status: TodoStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// Events pushed by stateful tools, drained by the agent loop.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    TodoUpdate(Vec<TodoItem>),
    ModeChanged(AgentMode),
}
