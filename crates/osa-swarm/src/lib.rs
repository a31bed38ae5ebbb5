// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Swarm orchestration (C14): decompose a task into a [`osa_planner::Plan`],
//! execute it wave-by-wave over the task queue (C12), and synthesize a final
//! result from the per-agent outputs.

mod mailbox;
mod orchestrator;
mod status;
mod synthesis;
mod wave;

pub use mailbox::Mailbox;
pub use orchestrator::{SwarmError, SwarmOrchestrator};
pub use status::{AgentProgress, AgentState, SwarmState, SwarmStatus};
pub use synthesis::{synthesize, AgentResult};
pub use wave::compute_waves;
