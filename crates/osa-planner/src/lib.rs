//! LLM-assisted task decomposition into multi-agent swarm plans (C13).
mod plan;
mod recover;

pub use plan::{is_known_role, Pattern, Plan, PlannedAgent, SynthesisStrategy, ROLES};

use futures::StreamExt;
use serde::Deserialize;
use tracing::warn;

use osa_model::{CompletionRequest, Message, ModelProvider, ResponseEvent};

const DEFAULT_MAX_AGENTS: usize = 6;

const SYSTEM_PROMPT: &str = r#"You are a task decomposition planner. Given a task description, decide
how to split it across a small team of agents and respond with ONLY a JSON object
(no prose, no markdown fences) of this exact shape:

{
  "pattern": "parallel" | "pipeline" | "debate" | "review",
  "agents": [ { "role": "<role>", "task": "<task>" }, ... ],
  "synthesis_strategy": "merge" | "vote" | "chain",
  "rationale": "<one sentence>"
}

`role` must be one of: researcher, coder, reviewer, planner, critic, writer, tester, architect.
Use between 2 and the stated maximum number of agents."#;

/// Raw shape the model is asked for; deserialized before the closed-set and
/// arity checks run, since `serde` alone can't express "role in {...}".
#[derive(Deserialize)]
struct RawPlan {
    pattern: Pattern,
    agents: Vec<PlannedAgent>,
    #[serde(default)]
    synthesis_strategy: Option<SynthesisStrategy>,
    #[serde(default)]
    rationale: Option<String>,
}

/// Decompose `task_description` into a [`Plan`] by calling `provider` with a
/// strict JSON-schema prompt. Never fails — any error at any stage (network,
/// malformed JSON, a validation violation) falls back to
/// [`Plan::fallback`], so the return type alone documents the guarantee.
pub async fn decompose(
    provider: &dyn ModelProvider,
    task_description: &str,
    max_agents: Option<usize>,
) -> Plan {
    let max_agents = max_agents.unwrap_or(DEFAULT_MAX_AGENTS).max(2);

    match try_decompose(provider, task_description, max_agents).await {
        Ok(plan) => plan,
        Err(e) => {
            warn!(error = %e, "plan decomposition failed, using fallback plan");
            Plan::fallback(task_description)
        }
    }
}

async fn try_decompose(
    provider: &dyn ModelProvider,
    task_description: &str,
    max_agents: usize,
) -> anyhow::Result<Plan> {
    let req = CompletionRequest {
        messages: vec![
            Message::system(format!("{SYSTEM_PROMPT}\n\nMaximum agents: {max_agents}.")),
            Message::user(task_description),
        ],
        ..Default::default()
    };

    let mut stream = provider.complete(req).await?;
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        if let ResponseEvent::TextDelta(delta) = event? {
            text.push_str(&delta);
        }
    }

    let json = recover::extract_json_object(&text)
        .ok_or_else(|| anyhow::anyhow!("no JSON object found in planner response"))?;
    let raw: RawPlan = serde_json::from_str(&json)?;

    validate(raw, max_agents)
}

fn validate(raw: RawPlan, max_agents: usize) -> anyhow::Result<Plan> {
    if raw.agents.len() < 2 || raw.agents.len() > max_agents {
        anyhow::bail!(
            "plan has {} agents, expected between 2 and {max_agents}",
            raw.agents.len()
        );
    }
    for agent in &raw.agents {
        if !is_known_role(&agent.role) {
            anyhow::bail!("unknown role '{}'", agent.role);
        }
    }

    let synthesis_strategy = raw
        .synthesis_strategy
        .unwrap_or_else(|| raw.pattern.default_synthesis());

    Ok(Plan {
        pattern: raw.pattern,
        agents: raw.agents,
        synthesis_strategy,
        rationale: raw.rationale.unwrap_or_default(),
    })
}
