// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Serialize;

/// Lifecycle of one agent inside a swarm wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Per-agent progress surfaced through `GET /swarm/status/:id` (spec §4.14).
#[derive(Debug, Clone, Serialize)]
pub struct AgentProgress {
    pub agent_id: String,
    pub role: String,
    pub task: String,
    pub wave: usize,
    pub state: AgentState,
    pub tool_calls: usize,
    pub tokens: u64,
}

/// Overall swarm lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmState {
    Running,
    Completed,
    Failed,
    TimedOut,
}

/// Snapshot returned by `SwarmOrchestrator::status` (spec §4.14: "current
/// wave, agents, tool counts, tokens, completion percentage").
#[derive(Debug, Clone, Serialize)]
pub struct SwarmStatus {
    pub swarm_id: String,
    pub state: SwarmState,
    pub pattern: osa_planner::Pattern,
    pub current_wave: usize,
    pub total_waves: usize,
    pub agents: Vec<AgentProgress>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl SwarmStatus {
    /// Fraction of waves completed, in `[0.0, 1.0]`.
    pub fn completion_percentage(&self) -> f32 {
        if self.total_waves == 0 {
            return 1.0;
        }
        match self.state {
            SwarmState::Completed => 1.0,
            _ => (self.current_wave as f32 / self.total_waves as f32).clamp(0.0, 1.0),
        }
    }
}
