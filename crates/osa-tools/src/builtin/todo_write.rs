// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use crate::events::{TodoItem, TodoStatus, ToolEvent};
use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Replaces the agent's todo list wholesale and notifies the agent loop via
/// [`ToolEvent::TodoUpdate`] so a `TUI`/SSE consumer can render it without
/// polling.
pub struct TodoWriteTool {
    todos: Arc<Mutex<Vec<TodoItem>>>,
    events: mpsc::Sender<ToolEvent>,
}

impl TodoWriteTool {
    pub fn new(todos: Arc<Mutex<Vec<TodoItem>>>, events: mpsc::Sender<ToolEvent>) -> Self {
        Self { todos, events }
    }
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        "todo_write"
    }

    fn description(&self) -> &str {
        "Replace the current todo list with the given items. Use this to plan and \
         track multi-step work; call it again whenever the plan changes or an item \
         completes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "content": { "type": "string" },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"]
                            }
                        },
                        "required": ["id", "content", "status"]
                    }
                }
            },
            "required": ["todos"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let raw = match call.args.get("todos").and_then(|v| v.as_array()) {
            Some(a) => a,
            None => return ToolOutput::err(&call.id, "missing 'todos' array"),
        };

        let mut items = Vec::with_capacity(raw.len());
        for item in raw {
            let id = match item.get("id").and_then(|v| v.as_str()) {
                Some(s) => s.to_string(),
                None => return ToolOutput::err(&call.id, "todo item missing 'id'"),
            };
            let content = match item.get("content").and_then(|v| v.as_str()) {
                Some(s) => s.to_string(),
                None => return ToolOutput::err(&call.id, "todo item missing 'content'"),
            };
            let status = match item.get("status").and_then(|v| v.as_str()) {
                Some("pending") => TodoStatus::Pending,
                Some("in_progress") => TodoStatus::InProgress,
                Some("completed") => TodoStatus::Completed,
                Some(other) => {
                    return ToolOutput::err(&call.id, format!("unknown status: {other}"))
                }
                None => return ToolOutput::err(&call.id, "todo item missing 'status'"),
            };
            items.push(TodoItem { id, content, status });
        }

        let count = items.len();
        *self.todos.lock().await = items.clone();
        let _ = self.events.send(ToolEvent::TodoUpdate(items)).await;

        ToolOutput::ok(&call.id, format!("todo list updated ({count} items)"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "1".into(), name: "todo_write".into(), args }
    }

    #[tokio::test]
    async fn replaces_todo_list_and_emits_event() {
        let todos = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::channel(4);
        let tool = TodoWriteTool::new(todos.clone(), tx);

        let out = tool
            .execute(&call(json!({
                "todos": [{"id": "1", "content": "write tests", "status": "pending"}]
            })))
            .await;
        assert!(!out.is_error);
        assert_eq!(todos.lock().await.len(), 1);

        let event = rx.try_recv().unwrap();
        assert!(matches!(event, ToolEvent::TodoUpdate(v) if v.len() == 1));
    }

    #[tokio::test]
    async fn missing_todos_field_is_error() {
        let todos = Arc::new(Mutex::new(Vec::new()));
        let (tx, _rx) = mpsc::channel(4);
        let tool = TodoWriteTool::new(todos, tx);
        let out = tool.execute(&call(json!({}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn unknown_status_is_error() {
        let todos = Arc::new(Mutex::new(Vec::new()));
        let (tx, _rx) = mpsc::channel(4);
        let tool = TodoWriteTool::new(todos, tx);
        let out = tool
            .execute(&call(json!({
                "todos": [{"id": "1", "content": "x", "status": "done"}]
            })))
            .await;
        assert!(out.is_error);
    }
}
