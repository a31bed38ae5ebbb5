// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Triggers (spec §4.16, §6 `TRIGGERS.json`): event-driven entries fired by
//! an inbound HTTP endpoint, with their action template-interpolated from
//! the caller-supplied variables.

use serde::{Deserialize, Serialize};

use crate::job::JobAction;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerJob {
    pub id: String,
    pub action: JobAction,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Load the trigger list from `path`. A missing file means "no triggers
/// configured" rather than an error.
pub async fn load_triggers(path: &str) -> anyhow::Result<Vec<TriggerJob>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Substitute `{{var}}` placeholders in `action` with `vars` (spec §4.16:
/// "template-interpolated").
pub fn interpolate_action(action: &JobAction, vars: &std::collections::HashMap<String, String>) -> JobAction {
    match action {
        JobAction::AgentMessage { text } => {
            JobAction::AgentMessage { text: crate::job::interpolate_template(text, vars) }
        }
        JobAction::Shell { command } => {
            JobAction::Shell { command: crate::job::interpolate_template(command, vars) }
        }
        JobAction::Webhook { url, body } => JobAction::Webhook {
            url: crate::job::interpolate_template(url, vars),
            body: body.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn missing_file_is_empty_list() {
        let triggers = load_triggers("/tmp/osa-triggers-does-not-exist.json").await.unwrap();
        assert!(triggers.is_empty());
    }

    #[tokio::test]
    async fn loads_triggers_from_json() {
        let path = std::env::temp_dir().join(format!("osa-triggers-test-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &path,
            r#"[{"id":"deploy","action":{"type":"agent_message","text":"deploy {{env}}"},"enabled":true}]"#,
        )
        .await
        .unwrap();
        let triggers = load_triggers(path.to_str().unwrap()).await.unwrap();
        assert_eq!(triggers.len(), 1);
        tokio::fs::remove_file(&path).await.ok();
    }

    #[test]
    fn interpolates_agent_message_text() {
        let action = JobAction::AgentMessage { text: "deploy {{env}}".to_string() };
        let mut vars = HashMap::new();
        vars.insert("env".to_string(), "staging".to_string());
        match interpolate_action(&action, &vars) {
            JobAction::AgentMessage { text } => assert_eq!(text, "deploy staging"),
            _ => panic!("wrong variant"),
        }
    }
}
