use serde::{Deserialize, Serialize};

/// Execution shape: how agents relate to each other across waves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Parallel,
    Pipeline,
    Debate,
    Review,
}

/// How each wave's outputs are combined into the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStrategy {
    Merge,
    Vote,
    Chain,
}

impl Pattern {
    /// Default synthesis strategy for this pattern, used when the planner's
    /// output omits or mismatches `synthesis_strategy`.
    pub fn default_synthesis(self) -> SynthesisStrategy {
        match self {
            Pattern::Parallel => SynthesisStrategy::Merge,
            Pattern::Pipeline => SynthesisStrategy::Chain,
            Pattern::Debate => SynthesisStrategy::Vote,
            Pattern::Review => SynthesisStrategy::Chain,
        }
    }
}

/// Closed set of roles a plan's agents may be assigned (spec §3).
pub const ROLES: &[&str] = &[
    "researcher",
    "coder",
    "reviewer",
    "planner",
    "critic",
    "writer",
    "tester",
    "architect",
];

pub fn is_known_role(role: &str) -> bool {
    ROLES.contains(&role)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAgent {
    pub role: String,
    pub task: String,
}

/// The planner's output: an execution pattern, its agents, how to combine
/// their results, and a human-readable rationale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub pattern: Pattern,
    pub agents: Vec<PlannedAgent>,
    pub synthesis_strategy: SynthesisStrategy,
    pub rationale: String,
}

impl Plan {
    /// The safe fallback plan used whenever decomposition fails at any
    /// stage: a 2-agent parallel `{researcher, writer}` covering the
    /// original task description verbatim (spec §4.13).
    pub fn fallback(task_description: &str) -> Self {
        Plan {
            pattern: Pattern::Parallel,
            agents: vec![
                PlannedAgent {
                    role: "researcher".to_string(),
                    task: format!("Research: {task_description}"),
                },
                PlannedAgent {
                    role: "writer".to_string(),
                    task: format!("Write up: {task_description}"),
                },
            ],
            synthesis_strategy: SynthesisStrategy::Merge,
            rationale: "fallback: decomposition failed, using a safe default parallel plan"
                .to_string(),
        }
    }
}
