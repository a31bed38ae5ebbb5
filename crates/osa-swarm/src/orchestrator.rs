// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Swarm orchestrator (spec §4.14, C14): decomposes a task into a [`Plan`],
//! executes it wave-by-wave over the shared task queue, and synthesizes a
//! final result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use osa_config::{AgentConfig, AgentMode};
use osa_core::{Agent, AgentEvent, AgentRuntimeContext, EventBus, EventTag};
use osa_model::ModelProvider;
use osa_planner::{Pattern, Plan, SynthesisStrategy};
use osa_queue::TaskQueue;
use osa_tools::ToolRegistry;
use serde_json::json;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Semaphore};
use tracing::warn;
use uuid::Uuid;

use crate::mailbox::Mailbox;
use crate::status::{AgentProgress, AgentState, SwarmState, SwarmStatus};
use crate::synthesis::{synthesize, AgentResult};
use crate::wave::compute_waves;

#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("max concurrent swarms ({0}) already running")]
    TooManySwarms(usize),
    #[error("swarm {0} not found")]
    NotFound(String),
}

struct SwarmRecord {
    plan: Plan,
    waves: Vec<Vec<usize>>,
    current_wave: AtomicUsize,
    agents: AsyncMutex<Vec<AgentProgress>>,
    state: AsyncMutex<SwarmState>,
    result: AsyncMutex<Option<String>>,
    error: AsyncMutex<Option<String>>,
}

/// Wave-executing orchestrator, owning the set of in-flight swarms for one
/// process (spec §4.14's "max 10 concurrent swarms per process").
pub struct SwarmOrchestrator {
    bus: Arc<EventBus>,
    queue: Arc<TaskQueue>,
    tools: Arc<ToolRegistry>,
    agent_config: Arc<AgentConfig>,
    max_concurrent_swarms: usize,
    max_agents_per_swarm: usize,
    swarm_timeout: Duration,
    swarms: Arc<DashMap<String, Arc<SwarmRecord>>>,
    /// One permit per concurrently running swarm (spec §4.14: "max 10
    /// concurrent swarms per process"). Acquired in `launch` before the
    /// planner round-trip and held for the spawned task's lifetime, so the
    /// cap can't be busted by concurrent `launch` calls racing a stale count.
    concurrency: Arc<Semaphore>,
}

impl SwarmOrchestrator {
    pub fn new(
        bus: Arc<EventBus>,
        queue: Arc<TaskQueue>,
        tools: Arc<ToolRegistry>,
        agent_config: Arc<AgentConfig>,
        max_concurrent_swarms: usize,
        max_agents_per_swarm: usize,
        swarm_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            queue,
            tools,
            agent_config,
            max_concurrent_swarms,
            max_agents_per_swarm,
            swarm_timeout,
            swarms: Arc::new(DashMap::new()),
            concurrency: Arc::new(Semaphore::new(max_concurrent_swarms)),
        })
    }

    /// Decompose `task` into a plan (optionally forcing `pattern`) and launch
    /// its wave execution in the background. Returns the new swarm's id
    /// immediately; poll [`status`](Self::status) for progress.
    pub async fn launch(
        self: &Arc<Self>,
        provider: Arc<dyn ModelProvider>,
        task: String,
        pattern: Option<Pattern>,
    ) -> Result<String, SwarmError> {
        let permit = self
            .concurrency
            .clone()
            .try_acquire_owned()
            .map_err(|_| SwarmError::TooManySwarms(self.max_concurrent_swarms))?;

        let mut plan = osa_planner::decompose(provider.as_ref(), &task, Some(self.max_agents_per_swarm)).await;
        if let Some(forced) = pattern {
            plan.pattern = forced;
            plan.synthesis_strategy = forced.default_synthesis();
        }
        if plan.agents.len() > self.max_agents_per_swarm {
            plan.agents.truncate(self.max_agents_per_swarm);
        }

        let swarm_id = Uuid::new_v4().to_string();
        let waves = compute_waves(&plan);
        let agents = plan
            .agents
            .iter()
            .enumerate()
            .map(|(i, a)| AgentProgress {
                agent_id: format!("{swarm_id}:{i}"),
                role: a.role.clone(),
                task: a.task.clone(),
                wave: waves.iter().position(|w| w.contains(&i)).unwrap_or(0),
                state: AgentState::Pending,
                tool_calls: 0,
                tokens: 0,
            })
            .collect();

        let record = Arc::new(SwarmRecord {
            plan,
            waves,
            current_wave: AtomicUsize::new(0),
            agents: AsyncMutex::new(agents),
            state: AsyncMutex::new(SwarmState::Running),
            result: AsyncMutex::new(None),
            error: AsyncMutex::new(None),
        });
        self.swarms.insert(swarm_id.clone(), record.clone());

        self.bus.publish(
            EventTag::SwarmProgress,
            json!({"swarm_id": swarm_id, "state": "running", "total_waves": record.waves.len()}),
        );

        let this = self.clone();
        let id = swarm_id.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let outcome = tokio::time::timeout(
                this.swarm_timeout,
                this.run_waves(&id, record.clone(), provider),
            )
            .await;
            let mut state = record.state.lock().await;
            match outcome {
                Ok(Ok(result)) => {
                    *record.result.lock().await = Some(result);
                    *state = SwarmState::Completed;
                }
                Ok(Err(e)) => {
                    *record.error.lock().await = Some(e.to_string());
                    *state = SwarmState::Failed;
                }
                Err(_) => {
                    *record.error.lock().await = Some("swarm timed out".to_string());
                    *state = SwarmState::TimedOut;
                }
            }
            this.bus.publish(
                EventTag::SwarmProgress,
                json!({"swarm_id": id, "state": format!("{:?}", *state).to_lowercase()}),
            );
            // `_permit` drops here, freeing a concurrency slot.
        });

        Ok(swarm_id)
    }

    async fn run_waves(
        &self,
        swarm_id: &str,
        record: Arc<SwarmRecord>,
        provider: Arc<dyn ModelProvider>,
    ) -> anyhow::Result<String> {
        let mailbox = Mailbox::new();

        for (wave_idx, wave) in record.waves.iter().enumerate() {
            record.current_wave.store(wave_idx, Ordering::SeqCst);
            self.bus.publish(
                EventTag::SwarmProgress,
                json!({"swarm_id": swarm_id, "wave": wave_idx, "wave_agents": wave.len()}),
            );

            let mut handles = Vec::with_capacity(wave.len());
            for &idx in wave {
                let agent_plan = &record.plan.agents[idx];
                let agent_id = format!("{swarm_id}:{idx}");
                let payload = json!({"role": agent_plan.role, "task": agent_plan.task});
                self.queue.enqueue(&agent_id, &agent_id, payload, 1).await;

                {
                    let mut agents = record.agents.lock().await;
                    if let Some(p) = agents.iter_mut().find(|p| p.agent_id == agent_id) {
                        p.state = AgentState::Running;
                    }
                }

                let prior = mailbox.all();
                let task_text = build_task_text(&agent_plan.task, &prior, record.plan.pattern);
                let role = agent_plan.role.clone();
                let provider = provider.clone();
                let tools = self.tools.clone();
                let config = self.agent_config.clone();
                let queue = self.queue.clone();

                handles.push(tokio::spawn(async move {
                    let leased = queue.lease(&agent_id, 300_000).await;
                    let outcome = run_agent_task(provider, tools, config, &role, task_text).await;
                    match &outcome {
                        Ok((output, _, _)) => {
                            queue.complete(&agent_id, json!({"output": output})).await;
                        }
                        Err(e) => {
                            queue.fail(&agent_id, e.to_string()).await;
                        }
                    }
                    let _ = leased;
                    (agent_id, role, outcome)
                }));
            }

            let mut results = Vec::with_capacity(handles.len());
            for handle in handles {
                let (agent_id, role, outcome) = handle.await?;
                let mut agents = record.agents.lock().await;
                let progress = agents.iter_mut().find(|p| p.agent_id == agent_id);
                match outcome {
                    Ok((output, tool_calls, tokens)) => {
                        if let Some(p) = progress {
                            p.state = AgentState::Completed;
                            p.tool_calls = tool_calls;
                            p.tokens = tokens;
                        }
                        mailbox.post(&agent_id, output.clone());
                        results.push(AgentResult { role, output });
                    }
                    Err(e) => {
                        if let Some(p) = progress {
                            p.state = AgentState::Failed;
                        }
                        warn!(swarm_id, agent_id, error = %e, "swarm agent task failed");
                    }
                }
            }

            self.bus.publish(
                EventTag::SwarmProgress,
                json!({"swarm_id": swarm_id, "wave": wave_idx, "wave_completed": true}),
            );

            if results.is_empty() && !wave.is_empty() {
                anyhow::bail!("all agents in wave {wave_idx} failed");
            }
        }

        let all_outputs = mailbox.all();
        let results: Vec<AgentResult> = record
            .plan
            .agents
            .iter()
            .enumerate()
            .filter_map(|(i, a)| {
                all_outputs
                    .iter()
                    .find(|(id, _)| id == &format!("{swarm_id}:{i}"))
                    .map(|(_, output)| AgentResult { role: a.role.clone(), output: output.clone() })
            })
            .collect();

        Ok(synthesize(provider.as_ref(), record.plan.synthesis_strategy, &results).await)
    }

    /// Snapshot the current status of `swarm_id` (spec §4.14).
    pub async fn status(&self, swarm_id: &str) -> Result<SwarmStatus, SwarmError> {
        let record = self
            .swarms
            .get(swarm_id)
            .map(|e| e.clone())
            .ok_or_else(|| SwarmError::NotFound(swarm_id.to_string()))?;

        Ok(SwarmStatus {
            swarm_id: swarm_id.to_string(),
            state: *record.state.lock().await,
            pattern: record.plan.pattern,
            current_wave: record.current_wave.load(Ordering::SeqCst),
            total_waves: record.waves.len(),
            agents: record.agents.lock().await.clone(),
            result: record.result.lock().await.clone(),
            error: record.error.lock().await.clone(),
        })
    }
}

/// Build the user-turn text for an agent, folding in prior waves' outputs
/// for patterns where they matter (pipeline/review/debate's critic wave).
fn build_task_text(task: &str, prior: &[(String, String)], pattern: Pattern) -> String {
    if prior.is_empty() || matches!(pattern, Pattern::Parallel) {
        return task.to_string();
    }
    let context = prior
        .iter()
        .map(|(id, output)| format!("--- {id} ---\n{output}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{task}\n\nPrior agents produced:\n{context}")
}

fn role_system_prompt(role: &str) -> String {
    format!(
        "You are acting as the \"{role}\" in a multi-agent team working on a shared task. \
         Focus only on your assignment and respond with your finished work product, not a \
         restatement of the instructions."
    )
}

/// Run one sub-agent's assigned turn to completion and collect its final
/// text, tool-call count, and token usage (spec §4.14: "same machinery as
/// C10 but with role-specific system prompt").
async fn run_agent_task(
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    agent_config: Arc<AgentConfig>,
    role: &str,
    task_text: String,
) -> anyhow::Result<(String, usize, u64)> {
    let mode_lock = Arc::new(AsyncMutex::new(AgentMode::Agent));
    let (_tool_event_tx, tool_event_rx) = mpsc::channel(64);
    let runtime = AgentRuntimeContext {
        channel: "swarm".to_string(),
        provider_name: provider.name().to_string(),
        model_name: provider.model_name().to_string(),
        system_prompt_override: Some(role_system_prompt(role)),
        ..Default::default()
    };
    let max_context_tokens = provider
        .catalog_context_window()
        .map(|n| n as usize)
        .unwrap_or(agent_config.max_tokens as usize);

    let mut agent = Agent::new(provider, tools, agent_config, runtime, mode_lock, tool_event_rx, max_context_tokens);

    let (tx, mut rx) = mpsc::channel(256);
    let submit_fut = agent.submit(&task_text, tx);
    let drain_fut = async {
        let mut output = String::new();
        let mut tool_calls = 0usize;
        let mut tokens = 0u64;
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::TextComplete(t) => output = t,
                AgentEvent::ToolCallFinished { .. } => tool_calls += 1,
                AgentEvent::TokenUsage { input, output: out_tok, .. } => {
                    tokens = u64::from(input) + u64::from(out_tok);
                }
                AgentEvent::Error(e) => warn!(error = %e, "swarm sub-agent reported an error"),
                _ => {}
            }
        }
        (output, tool_calls, tokens)
    };

    let (submit_result, drained) = tokio::join!(submit_fut, drain_fut);
    submit_result?;
    Ok(drained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use osa_model::ScriptedMockProvider;

    fn orchestrator() -> Arc<SwarmOrchestrator> {
        SwarmOrchestrator::new(
            EventBus::new(),
            Arc::new(TaskQueue::in_memory()),
            Arc::new(ToolRegistry::default()),
            Arc::new(AgentConfig::default()),
            10,
            10,
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn launch_then_eventually_completes() {
        let orch = orchestrator();
        let provider: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text(
            r#"{"pattern":"parallel","agents":[{"role":"researcher","task":"a"},{"role":"writer","task":"b"}],"rationale":"x"}"#,
        ));
        let id = orch.launch(provider, "do the thing".to_string(), None).await.unwrap();

        let mut status = orch.status(&id).await.unwrap();
        let mut tries = 0;
        while !matches!(status.state, SwarmState::Completed | SwarmState::Failed) && tries < 200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = orch.status(&id).await.unwrap();
            tries += 1;
        }
        assert_eq!(status.state, SwarmState::Completed);
        assert!(status.result.is_some());
    }

    #[tokio::test]
    async fn status_of_unknown_swarm_errors() {
        let orch = orchestrator();
        assert!(orch.status("nope").await.is_err());
    }

    #[tokio::test]
    async fn too_many_concurrent_swarms_is_rejected() {
        let orch = SwarmOrchestrator::new(
            EventBus::new(),
            Arc::new(TaskQueue::in_memory()),
            Arc::new(ToolRegistry::default()),
            Arc::new(AgentConfig::default()),
            0,
            10,
            Duration::from_secs(30),
        );
        let provider: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("irrelevant"));
        let err = orch.launch(provider, "task".to_string(), None).await.unwrap_err();
        assert!(matches!(err, SwarmError::TooManySwarms(0)));
    }
}
