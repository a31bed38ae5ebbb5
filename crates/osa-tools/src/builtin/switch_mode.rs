// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use osa_config::AgentMode;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use crate::events::ToolEvent;
use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Switches the agent's active mode (research / plan / agent). The shared
/// `mode` lock is the same `Arc` given to `Agent::new`, so the change is
/// visible to the agent loop the moment this tool returns; the
/// `ToolEvent::ModeChanged` notification lets the loop update its own copy
/// and inform consumers without polling the lock every round.
pub struct SwitchModeTool {
    mode: Arc<Mutex<AgentMode>>,
    events: mpsc::Sender<ToolEvent>,
}

impl SwitchModeTool {
    pub fn new(mode: Arc<Mutex<AgentMode>>, events: mpsc::Sender<ToolEvent>) -> Self {
        Self { mode, events }
    }
}

#[async_trait]
impl Tool for SwitchModeTool {
    fn name(&self) -> &str {
        "switch_mode"
    }

    fn description(&self) -> &str {
        "Switch the agent's operating mode. 'research' restricts to read-only tools, \
         'plan' restricts to planning with no code changes, 'agent' allows full \
         read/write access."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": {
                    "type": "string",
                    "enum": ["research", "plan", "agent"]
                }
            },
            "required": ["mode"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let new_mode = match call.args.get("mode").and_then(|v| v.as_str()) {
            Some("research") => AgentMode::Research,
            Some("plan") => AgentMode::Plan,
            Some("agent") => AgentMode::Agent,
            Some(other) => return ToolOutput::err(&call.id, format!("unknown mode: {other}")),
            None => return ToolOutput::err(&call.id, "missing 'mode'"),
        };

        *self.mode.lock().await = new_mode;
        let _ = self.events.send(ToolEvent::ModeChanged(new_mode)).await;

        ToolOutput::ok(&call.id, format!("switched to {new_mode} mode"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "1".into(), name: "switch_mode".into(), args }
    }

    #[tokio::test]
    async fn switches_mode_and_emits_event() {
        let mode = Arc::new(Mutex::new(AgentMode::Agent));
        let (tx, mut rx) = mpsc::channel(4);
        let tool = SwitchModeTool::new(mode.clone(), tx);

        let out = tool.execute(&call(json!({"mode": "research"}))).await;
        assert!(!out.is_error);
        assert_eq!(*mode.lock().await, AgentMode::Research);
        assert!(matches!(rx.try_recv().unwrap(), ToolEvent::ModeChanged(AgentMode::Research)));
    }

    #[tokio::test]
    async fn unknown_mode_is_error() {
        let mode = Arc::new(Mutex::new(AgentMode::Agent));
        let (tx, _rx) = mpsc::channel(4);
        let tool = SwitchModeTool::new(mode, tx);
        let out = tool.execute(&call(json!({"mode": "turbo"}))).await;
        assert!(out.is_error);
    }
}
