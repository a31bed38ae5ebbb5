// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Integration tests for osa's core logic using the mock model provider.
use std::sync::Arc;
use std::time::Duration;

use osa_config::{AgentConfig, AgentMode, Config};
use osa_core::{classify, tier1, Agent, AgentRuntimeContext, FilterOutcome, SessionRegistry};
use osa_model::MockProvider;
use osa_tools::{events::ToolEvent, ToolRegistry};
use tokio::sync::{mpsc, Mutex};

fn mock_agent(mode: AgentMode) -> Agent {
    let model: Arc<dyn osa_model::ModelProvider> = Arc::new(MockProvider);
    let tools = Arc::new(ToolRegistry::default());
    let config = Arc::new(AgentConfig::default());
    let mode_lock = Arc::new(Mutex::new(mode));
    let (_tx, tool_event_rx) = mpsc::channel::<ToolEvent>(64);
    Agent::new(
        model,
        tools,
        config,
        AgentRuntimeContext::default(),
        mode_lock,
        tool_event_rx,
        128_000,
    )
}

#[tokio::test]
async fn agent_returns_mock_response() {
    let mut agent = mock_agent(AgentMode::Agent);
    let (tx, mut rx) = mpsc::channel(64);
    agent.submit("hello", tx).await.unwrap();

    let mut got_text = false;
    while let Ok(event) = rx.try_recv() {
        if let osa_core::AgentEvent::TextDelta(t) = event {
            assert!(t.contains("MOCK"));
            got_text = true;
        }
    }
    assert!(got_text, "expected at least one TextDelta event");
}

#[test]
fn config_defaults_are_valid() {
    let cfg = Config::default();
    assert_eq!(cfg.model.provider, "openai");
    assert!(cfg.agent.max_tool_rounds > 0);
    assert!(cfg.agent.compaction_warn_threshold > 0.0);
}

#[test]
fn tool_policy_auto_approve() {
    use osa_config::ToolsConfig;
    use osa_tools::{ApprovalPolicy, ToolPolicy};

    let cfg = ToolsConfig::default();
    let policy = ToolPolicy::from_config(&cfg);
    assert_eq!(policy.decide("cat /etc/hosts"), ApprovalPolicy::Auto);
    assert_eq!(policy.decide("ls /tmp"), ApprovalPolicy::Auto);
}

#[test]
fn tool_policy_deny() {
    use osa_config::ToolsConfig;
    use osa_tools::{ApprovalPolicy, ToolPolicy};

    let cfg = ToolsConfig {
        deny_patterns: vec!["rm -rf /*".into()],
        ..ToolsConfig::default()
    };
    let policy = ToolPolicy::from_config(&cfg);
    assert_eq!(policy.decide("rm -rf /*"), ApprovalPolicy::Deny);
}

#[tokio::test]
async fn shell_tool_executes_echo() {
    use osa_tools::Tool;
    use osa_tools::{ShellTool, ToolCall};

    let tool = ShellTool::default();
    let call = ToolCall {
        id: "1".into(),
        name: "shell".into(),
        args: serde_json::json!({ "shell_command": "echo hello_world" }),
    };
    let output = tool.execute(&call).await;
    assert!(!output.is_error);
    assert!(output.content.contains("hello_world"));
}

#[tokio::test]
async fn fs_tool_write_read_roundtrip() {
    use osa_tools::{ReadFileTool, Tool, ToolCall, WriteTool};

    let path = format!("/tmp/osa_test_{}.txt", uuid::Uuid::new_v4());

    let write_call = ToolCall {
        id: "w1".into(),
        name: "write_file".into(),
        args: serde_json::json!({ "path": path, "text": "roundtrip", "append": false }),
    };
    let wo = WriteTool.execute(&write_call).await;
    assert!(!wo.is_error, "write failed: {}", wo.content);

    let read_call = ToolCall {
        id: "r1".into(),
        name: "read_file".into(),
        args: serde_json::json!({ "path": path }),
    };
    let ro = ReadFileTool.execute(&read_call).await;
    assert!(!ro.is_error);
    assert!(ro.content.contains("roundtrip"));

    let _ = std::fs::remove_file(&path);
}

// ── Noise filter / signal classifier (spec §4.5, §4.6) ───────────────────────

#[test]
fn noise_filter_rejects_empty_and_short_messages() {
    assert!(matches!(
        tier1("", None, None, Duration::from_secs(120)),
        FilterOutcome::Noise { reason: "empty", .. }
    ));
    assert!(matches!(
        tier1("ok", None, None, Duration::from_secs(120)),
        FilterOutcome::Noise { reason: "too_short", .. }
    ));
}

#[test]
fn noise_filter_treats_acknowledgement_as_noise_with_canned_reply() {
    let outcome = tier1("thanks", None, None, Duration::from_secs(120));
    match outcome {
        FilterOutcome::Noise { canned_reply, .. } => {
            assert_eq!(canned_reply, Some("\u{1F44D}"));
        }
        FilterOutcome::Signal { .. } => panic!("expected noise"),
    }
}

#[test]
fn noise_filter_lets_real_requests_through_as_signal() {
    let outcome = tier1("please build the login page", None, None, Duration::from_secs(120));
    assert!(matches!(outcome, FilterOutcome::Signal { .. }));
}

#[test]
fn signal_classifier_is_deterministic_and_format_follows_channel_only() {
    let a = classify("fix the login bug urgently", "cli", 1.0, "2026-07-30T00:00:00Z");
    let b = classify("fix the login bug urgently", "cli", 1.0, "2026-07-30T00:00:00Z");
    assert_eq!(a.mode, b.mode);
    assert_eq!(a.genre, b.genre);
    assert_eq!(a.format, osa_core::format_for_channel("cli"));
}

#[test]
fn signal_classifier_weight_is_always_in_unit_interval() {
    let signal = classify("", "webhook", 2.5, "2026-07-30T00:00:00Z");
    assert!(signal.weight >= 0.0 && signal.weight <= 1.0);
}

// ── Session registry lifecycle (spec §4.11) ──────────────────────────────────

#[tokio::test]
async fn session_registry_tracks_and_terminates_sessions() {
    let registry = SessionRegistry::new();
    assert!(!registry.whereis("s1"));

    registry.ensure_loop("s1", mock_agent(AgentMode::Agent)).await;
    assert!(registry.whereis("s1"));
    assert!(registry.list().contains(&"s1".to_string()));

    assert!(registry.terminate("s1"));
    assert!(!registry.whereis("s1"));
}

// ── Swarm pattern parsing (spec §4.14) ───────────────────────────────────────

#[test]
fn swarm_pattern_rejects_unknown_strings() {
    let parsed: Result<osa_planner::Pattern, _> = serde_json::from_value(serde_json::json!("bogus"));
    assert!(parsed.is_err());
}

#[test]
fn swarm_pattern_accepts_known_strings() {
    for name in ["parallel", "pipeline", "debate", "review"] {
        let parsed: osa_planner::Pattern = serde_json::from_value(serde_json::json!(name)).unwrap();
        let _ = parsed;
    }
}
