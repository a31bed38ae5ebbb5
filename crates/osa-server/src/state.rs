// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared process-wide state (spec §5: "process-wide, single-writer,
//! lock-free snapshot reads") handed to every HTTP handler.

use std::sync::Arc;

use dashmap::DashMap;
use osa_config::{AgentConfig, AgentMode, Config};
use osa_core::{Agent, AgentRuntimeContext, EventBus, SessionRegistry};
use osa_model::ProviderRegistry;
use osa_swarm::SwarmOrchestrator;
use osa_tools::{events::ToolEvent, ToolRegistry};
use tokio::sync::{mpsc, Mutex};

pub struct AppState {
    pub config: Arc<Config>,
    pub bus: Arc<EventBus>,
    pub sessions: Arc<SessionRegistry>,
    pub providers: Arc<ProviderRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub agent_config: Arc<AgentConfig>,
    pub swarm: Arc<SwarmOrchestrator>,
    /// Nonce replay table for HMAC request signing (spec §4.17): nonce ->
    /// time it was first seen. Reaped on `nonce_reap_secs`.
    pub seen_nonces: DashMap<String, chrono::DateTime<chrono::Utc>>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Build a fresh agent bound to the primary provider, for a new session.
    ///
    /// Each agent gets its own `ToolEvent` channel; the HTTP surface does not
    /// expose interactive mode-switch/todo tools, so nothing is ever sent on
    /// the sender half — this mirrors the minimal wiring already used by the
    /// in-process session registry's own tests.
    pub fn build_agent(&self, channel: &str) -> anyhow::Result<Agent> {
        let provider = self
            .providers
            .primary()
            .ok_or_else(|| anyhow::anyhow!("no reachable model provider"))?;
        let max_context_tokens = provider
            .catalog_context_window()
            .map(|n| n as usize)
            .unwrap_or(self.agent_config.max_tokens as usize);
        let mode_lock = Arc::new(Mutex::new(self.agent_config.default_mode));
        let (_tx, tool_event_rx) = mpsc::channel::<ToolEvent>(64);
        let runtime = AgentRuntimeContext {
            channel: channel.to_string(),
            provider_name: provider.name().to_string(),
            model_name: provider.model_name().to_string(),
            ..Default::default()
        };
        Ok(Agent::new(
            provider,
            self.tools.clone(),
            self.agent_config.clone(),
            runtime,
            mode_lock,
            tool_event_rx,
            max_context_tokens,
        ))
    }

    pub fn default_mode(&self) -> AgentMode {
        self.agent_config.default_mode
    }
}
