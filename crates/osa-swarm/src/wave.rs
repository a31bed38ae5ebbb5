// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Execution DAG computation (spec §4.14): turns a [`Plan`]'s flat agent
//! list into an ordered list of waves, each wave a list of agent indices
//! that run concurrently.

use osa_planner::{Pattern, Plan};

/// Compute the wave DAG for `plan`.
///
/// - `parallel`: one wave containing every agent.
/// - `pipeline` / `review`: one agent per wave, in plan order — each wave's
///   output becomes the next wave's input.
/// - `debate`: every agent whose role is not `critic` runs in wave 0
///   (parallel proposers); the `critic` (if present) runs alone in wave 1.
///   With no critic, falls back to a single parallel wave.
pub fn compute_waves(plan: &Plan) -> Vec<Vec<usize>> {
    match plan.pattern {
        Pattern::Parallel => vec![(0..plan.agents.len()).collect()],
        Pattern::Pipeline | Pattern::Review => {
            (0..plan.agents.len()).map(|i| vec![i]).collect()
        }
        Pattern::Debate => {
            let critic_idx = plan.agents.iter().position(|a| a.role == "critic");
            match critic_idx {
                Some(ci) => {
                    let proposers: Vec<usize> =
                        (0..plan.agents.len()).filter(|&i| i != ci).collect();
                    vec![proposers, vec![ci]]
                }
                None => vec![(0..plan.agents.len()).collect()],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osa_planner::{PlannedAgent, SynthesisStrategy};

    fn plan(pattern: Pattern, roles: &[&str]) -> Plan {
        Plan {
            pattern,
            agents: roles
                .iter()
                .map(|r| PlannedAgent { role: r.to_string(), task: "t".to_string() })
                .collect(),
            synthesis_strategy: SynthesisStrategy::Merge,
            rationale: String::new(),
        }
    }

    #[test]
    fn parallel_is_single_wave() {
        let p = plan(Pattern::Parallel, &["researcher", "writer", "coder"]);
        let waves = compute_waves(&p);
        assert_eq!(waves, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn pipeline_is_one_agent_per_wave() {
        let p = plan(Pattern::Pipeline, &["researcher", "writer"]);
        let waves = compute_waves(&p);
        assert_eq!(waves, vec![vec![0], vec![1]]);
    }

    #[test]
    fn review_is_one_agent_per_wave() {
        let p = plan(Pattern::Review, &["coder", "reviewer"]);
        let waves = compute_waves(&p);
        assert_eq!(waves, vec![vec![0], vec![1]]);
    }

    #[test]
    fn debate_splits_proposers_from_critic() {
        let p = plan(Pattern::Debate, &["researcher", "writer", "critic"]);
        let waves = compute_waves(&p);
        assert_eq!(waves, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn debate_without_critic_is_single_wave() {
        let p = plan(Pattern::Debate, &["researcher", "writer"]);
        let waves = compute_waves(&p);
        assert_eq!(waves, vec![vec![0, 1]]);
    }
}
