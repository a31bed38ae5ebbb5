// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared job action type and the agent-dispatch seam (spec §4.16).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What firing a job actually does. Shared by heartbeat items, cron
/// entries, and triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobAction {
    /// Dispatch `text` as an inbound message to the agent runtime.
    AgentMessage { text: String },
    /// Run a security-vetted shell command (spec §4.16).
    Shell { command: String },
    /// POST `body` to `url` as an outbound webhook.
    Webhook { url: String, body: serde_json::Value },
}

/// The scheduler's only dependency on the agent runtime: hand it text, get
/// back the agent's final response. Kept as a trait so this crate doesn't
/// need to know how sessions/providers/tools are wired — the binary crate
/// supplies the real implementation backed by `osa_core::SessionRegistry`.
#[async_trait]
pub trait AgentSink: Send + Sync {
    async fn dispatch(&self, text: &str) -> anyhow::Result<String>;
}

/// An `AgentSink` for tests and for deployments that run the scheduler
/// without a live agent runtime attached.
pub struct NullAgentSink;

#[async_trait]
impl AgentSink for NullAgentSink {
    async fn dispatch(&self, text: &str) -> anyhow::Result<String> {
        Ok(format!("(no agent sink configured) received: {text}"))
    }
}

/// Replace `{{var}}` placeholders in `template` with values from `vars`.
/// Unknown placeholders are left verbatim (spec §4.16 triggers are
/// "template-interpolated", not validated against a fixed schema).
pub fn interpolate_template(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        out = out.replace(&format!("{{{{{k}}}}}"), v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn null_sink_echoes_input() {
        let sink = NullAgentSink;
        let out = sink.dispatch("hello").await.unwrap();
        assert!(out.contains("hello"));
    }

    #[test]
    fn interpolates_known_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "world".to_string());
        assert_eq!(interpolate_template("hello {{name}}", &vars), "hello world");
    }

    #[test]
    fn leaves_unknown_placeholders_verbatim() {
        let vars = HashMap::new();
        assert_eq!(interpolate_template("hi {{nope}}", &vars), "hi {{nope}}");
    }
}
