// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Synthesis strategies (spec §4.14): combine a completed swarm's per-agent
//! outputs into a single final answer.

use futures::StreamExt;
use osa_model::{CompletionRequest, Message, ModelProvider, ResponseEvent};
use osa_planner::SynthesisStrategy;

/// One completed agent's contribution, in the order synthesis should
/// consider it.
pub struct AgentResult {
    pub role: String,
    pub output: String,
}

const MERGE_PROMPT: &str = "You are combining the outputs of several agents who worked on the \
same task from different angles. Produce one coherent final answer that \
integrates their contributions. Respond with the answer only, no preamble.";

const VOTE_PROMPT: &str = "You are judging several competing proposals for the same task. Pick \
the single best one and respond with it verbatim, followed by a short line \
starting with 'Justification:' explaining your choice.";

/// Run `strategy` over `results` using `provider` for LLM-backed strategies.
/// Never fails: a model error degrades to a deterministic concatenation so
/// the swarm always produces *something* (spec §4.14 synthesis never blocks
/// a swarm from completing).
pub async fn synthesize(
    provider: &dyn ModelProvider,
    strategy: SynthesisStrategy,
    results: &[AgentResult],
) -> String {
    match strategy {
        SynthesisStrategy::Chain => results.last().map(|r| r.output.clone()).unwrap_or_default(),
        SynthesisStrategy::Merge => {
            llm_synthesize(provider, MERGE_PROMPT, results).await.unwrap_or_else(|| fallback_join(results))
        }
        SynthesisStrategy::Vote => {
            llm_synthesize(provider, VOTE_PROMPT, results).await.unwrap_or_else(|| fallback_join(results))
        }
    }
}

async fn llm_synthesize(
    provider: &dyn ModelProvider,
    system_prompt: &str,
    results: &[AgentResult],
) -> Option<String> {
    let body = results
        .iter()
        .map(|r| format!("### {}\n{}", r.role, r.output))
        .collect::<Vec<_>>()
        .join("\n\n");

    let req = CompletionRequest {
        messages: vec![Message::system(system_prompt), Message::user(body)],
        ..Default::default()
    };

    let mut stream = provider.complete(req).await.ok()?;
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        if let Ok(ResponseEvent::TextDelta(delta)) = event {
            text.push_str(&delta);
        }
    }
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn fallback_join(results: &[AgentResult]) -> String {
    results
        .iter()
        .map(|r| format!("## {}\n{}", r.role, r.output))
        .collect::<Vec<_>>()
        .join("\n\n")
}
