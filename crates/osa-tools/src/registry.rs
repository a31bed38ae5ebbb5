// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use osa_config::AgentMode;

use crate::{Tool, ToolCall, ToolOutput};

/// A tool schema – mirrors osa_model::ToolSchema but keeps tools crate
/// independent from the model crate.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

type ToolMap = HashMap<String, Arc<dyn Tool>>;

/// Content-addressable registry of all available tools.
///
/// Registration builds a new immutable map and swaps it in atomically, so
/// every read (`get`, `schemas`, `names`, `execute`) is a lock-free snapshot
/// load — safe to call on every agent iteration without contending with a
/// concurrent registration.
pub struct ToolRegistry {
    tools: ArcSwap<ToolMap>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn register(&self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.rcu(|map| {
            let mut next = (**map).clone();
            next.insert(name.clone(), Arc::new(tool) as Arc<dyn Tool>);
            next
        });
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.load().get(name).cloned()
    }

    /// List all tool schemas. Lock-free snapshot read, per spec §4.8.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let snapshot = self.tools.load();
        let mut schemas: Vec<ToolSchema> = snapshot
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// List tool schemas gated to `mode`. A tool whose `modes()` is empty is
    /// available in every mode; otherwise `mode` must appear in the list.
    pub fn schemas_for_mode(&self, mode: AgentMode) -> Vec<ToolSchema> {
        let snapshot = self.tools.load();
        let mut schemas: Vec<ToolSchema> = snapshot
            .values()
            .filter(|t| {
                let modes = t.modes();
                modes.is_empty() || modes.contains(&mode)
            })
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// The output shape hint for the named tool, used by context-aware
    /// truncation. Unknown names default to [`crate::tool::OutputCategory::Generic`].
    pub fn output_category(&self, name: &str) -> crate::tool::OutputCategory {
        self.tools
            .load()
            .get(name)
            .map(|t| t.output_category())
            .unwrap_or_default()
    }

    /// Dispatch by exact registered name. Validates `call.args` against the
    /// tool's `parameters_schema()` before running the handler (spec §4.8:
    /// "validates arguments against `schema`") — unknown names and schema
    /// violations are both rejected without reaching `Tool::execute`.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let tool = self.tools.load().get(&call.name).cloned();
        match tool {
            Some(tool) => match validate_args(&tool.parameters_schema(), &call.args) {
                Ok(()) => tool.execute(call).await,
                Err(reason) => ToolOutput::err(&call.id, reason),
            },
            None => ToolOutput::err(&call.id, format!("unknown tool: {}", call.name)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.load().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight JSON-schema check: every name in the schema's top-level
/// `required` array must be present in `args`, and `args` must be an object
/// whenever the schema declares any properties at all. This is not a full
/// JSON Schema validator (no type/format/enum checking) — just enough to
/// catch a tool call missing a mandatory argument before it reaches the
/// handler, per spec §4.8.
fn validate_args(schema: &serde_json::Value, args: &serde_json::Value) -> Result<(), String> {
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    if required.is_empty() {
        return Ok(());
    }
    let obj = args.as_object();
    let missing: Vec<&str> = required
        .iter()
        .filter_map(|r| r.as_str())
        .filter(|name| !obj.is_some_and(|o| o.contains_key(*name)))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing required argument(s): {}", missing.join(", ")))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
