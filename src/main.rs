// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use dashmap::DashMap;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use osa_config::Config;
use osa_core::{classify, tier1, AgentEvent, EventBus, FilterOutcome, LoopReply, SessionRegistry};
use osa_model::ProviderRegistry;
use osa_queue::TaskQueue;
use osa_scheduler::{AgentSink, Scheduler};
use osa_server::AppState;
use osa_swarm::SwarmOrchestrator;
use osa_tools::{
    AskQuestionTool, DeleteFileTool, EditFileTool, FsTool, GlobTool, GrepTool, ListDirTool,
    ReadFileTool, ReadImageTool, SearchCodebaseTool, ShellTool, ToolRegistry, WebFetchTool,
    WebSearchTool, WriteTool,
};
use tokio::sync::mpsc;

/// CLI exit codes (spec §6).
const EXIT_OK: i32 = 0;
const EXIT_USER_ERROR: i32 = 1;
const EXIT_CONFIG_ERROR: i32 = 2;
const EXIT_PROVIDER_UNREACHABLE: i32 = 3;

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_USER_ERROR
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(Commands::Completions { shell }) = &cli.command {
        cli::print_completions(*shell);
        return Ok(EXIT_OK);
    }

    let config = match osa_config::load(cli.config.as_deref()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return Ok(EXIT_CONFIG_ERROR);
        }
    };

    match &cli.command {
        Some(Commands::ShowConfig) => {
            println!("{}", serde_yaml::to_string(&*config).unwrap_or_default());
            Ok(EXIT_OK)
        }
        Some(Commands::Completions { .. }) => unreachable!("handled above"),
        Some(Commands::Orchestrate { input, session_id }) => {
            run_orchestrate(config, input, session_id.clone()).await
        }
        Some(Commands::Classify { input }) => run_classify(input),
        Some(Commands::Serve { port, require_auth }) => run_serve(config, *port, *require_auth).await,
        None => {
            eprintln!("no subcommand given; run `osa --help` for usage");
            Ok(EXIT_USER_ERROR)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry().with(fmt::layer().with_target(true)).with(filter).try_init();
}

// ── Shared component construction ────────────────────────────────────────────

/// Build the provider fallback chain (spec §4.9): the configured primary
/// model first, then every named entry under `providers`, in deterministic
/// (sorted-by-key) order. Per-provider tool support isn't exposed in config,
/// so every entry is pushed as tool-capable; actual capability is whatever
/// the model itself reports when the agent's tool schemas are sent.
async fn build_provider_registry(config: &Config) -> anyhow::Result<Arc<ProviderRegistry>> {
    let mut builder = ProviderRegistry::builder();
    let primary = osa_model::from_config(&config.model).context("constructing primary model provider")?;
    builder = builder.push(Arc::from(primary), true);

    let mut names: Vec<_> = config.providers.keys().cloned().collect();
    names.sort();
    for name in names {
        let model_config = &config.providers[&name];
        match osa_model::from_config(model_config) {
            Ok(provider) => builder = builder.push(Arc::from(provider), true),
            Err(e) => tracing::warn!(provider = %name, error = %e, "skipping unusable fallback provider"),
        }
    }

    Ok(Arc::new(builder.boot().await))
}

fn build_tool_registry(config: &Config) -> Arc<ToolRegistry> {
    let registry = ToolRegistry::new();
    registry.register(FsTool);
    registry.register(WriteTool);
    registry.register(EditFileTool);
    registry.register(DeleteFileTool);
    registry.register(GlobTool);
    registry.register(GrepTool);
    registry.register(ListDirTool);
    registry.register(ReadFileTool);
    registry.register(ReadImageTool);
    registry.register(SearchCodebaseTool);
    registry.register(ShellTool::default());
    registry.register(WebFetchTool);
    registry.register(WebSearchTool { api_key: config.tools.web.search.api_key.clone() });
    registry.register(AskQuestionTool::new_headless());
    Arc::new(registry)
}

async fn build_app_state(config: Arc<Config>) -> anyhow::Result<Arc<AppState>> {
    let providers = build_provider_registry(&config).await?;
    if providers.is_empty() {
        anyhow::bail!("no reachable model provider");
    }
    let tools = build_tool_registry(&config);
    let bus = EventBus::new();
    let queue = Arc::new(TaskQueue::in_memory());
    let agent_config = Arc::new(config.agent.clone());
    let swarm = SwarmOrchestrator::new(
        bus.clone(),
        queue,
        tools.clone(),
        agent_config.clone(),
        config.server.max_concurrent_swarms,
        config.server.max_agents_per_swarm,
        Duration::from_secs(config.server.swarm_timeout_secs),
    );

    Ok(Arc::new(AppState {
        config,
        bus,
        sessions: SessionRegistry::new(),
        providers,
        tools,
        agent_config,
        swarm,
        seen_nonces: DashMap::new(),
        started_at: chrono::Utc::now(),
    }))
}

// ── `osa orchestrate` ────────────────────────────────────────────────────────

async fn run_orchestrate(config: Arc<Config>, input: &str, session_id: Option<String>) -> anyhow::Result<i32> {
    if input.trim().is_empty() {
        eprintln!("input must not be empty");
        return Ok(EXIT_USER_ERROR);
    }

    let start = Instant::now();
    let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let outcome = tier1(input, None, None, Duration::from_secs(120));
    if let FilterOutcome::Noise { canned_reply, .. } = outcome {
        let signal = classify(input, "cli", 0.0, chrono::Utc::now().to_rfc3339());
        print_orchestrate_result(canned_reply.unwrap_or_default(), &signal, &[], 0, start.elapsed(), &session_id);
        return Ok(EXIT_OK);
    }

    let state = match build_app_state(config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("provider unreachable: {e:#}");
            return Ok(EXIT_PROVIDER_UNREACHABLE);
        }
    };

    let agent = state.build_agent("cli")?;
    state.sessions.ensure_loop(&session_id, agent).await;

    let weight = match outcome {
        FilterOutcome::Signal { weight } => weight,
        FilterOutcome::Noise { .. } => unreachable!("noise outcomes return early above"),
    };
    let signal = classify(input, "cli", weight, chrono::Utc::now().to_rfc3339());
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
    let collect = tokio::spawn(async move {
        let mut output = String::new();
        let mut tools_used = Vec::new();
        let mut iteration_count = 0usize;
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::TextComplete(t) => output = t,
                AgentEvent::ToolCallStarted(call) => {
                    tools_used.push(call.name.clone());
                    iteration_count += 1;
                }
                AgentEvent::Error(e) => tracing::warn!(error = %e, "agent reported an error"),
                _ => {}
            }
        }
        (output, tools_used, iteration_count)
    });

    let reply = state.sessions.process_message(&session_id, input.to_string(), tx).await?;
    if matches!(reply, LoopReply::Busy) {
        collect.abort();
        anyhow::bail!("session is already processing a turn");
    }
    let (output, tools_used, iteration_count) = collect.await.context("event collector panicked")?;

    print_orchestrate_result(&output, &signal, &tools_used, iteration_count, start.elapsed(), &session_id);
    Ok(EXIT_OK)
}

fn print_orchestrate_result(
    output: &str,
    signal: &osa_core::Signal,
    tools_used: &[String],
    iteration_count: usize,
    elapsed: Duration,
    session_id: &str,
) {
    let body = serde_json::json!({
        "output": output,
        "signal": signal,
        "tools_used": tools_used,
        "iteration_count": iteration_count,
        "execution_ms": elapsed.as_millis() as u64,
        "session_id": session_id,
    });
    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
}

// ── `osa classify` ───────────────────────────────────────────────────────────

fn run_classify(input: &str) -> anyhow::Result<i32> {
    let outcome = tier1(input, None, None, Duration::from_secs(120));
    let (noise, weight) = match outcome {
        FilterOutcome::Noise { .. } => (true, 0.0),
        FilterOutcome::Signal { weight } => (false, weight),
    };
    let signal = classify(input, "cli", weight, chrono::Utc::now().to_rfc3339());
    let body = serde_json::json!({ "signal": signal, "noise": noise });
    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    Ok(EXIT_OK)
}

// ── `osa serve` ──────────────────────────────────────────────────────────────

async fn run_serve(config: Arc<Config>, port: Option<u16>, require_auth: bool) -> anyhow::Result<i32> {
    let mut config = (*config).clone();
    if let Some(port) = port {
        let host = config.server.bind.rsplit_once(':').map(|(h, _)| h.to_string()).unwrap_or_else(|| "0.0.0.0".to_string());
        config.server.bind = format!("{host}:{port}");
    }
    if require_auth {
        config.server.require_auth = true;
    }

    let state = match build_app_state(Arc::new(config)).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("provider unreachable: {e:#}");
            return Ok(EXIT_PROVIDER_UNREACHABLE);
        }
    };

    let scheduler_config = Arc::new(state.config.scheduler.clone());
    let sink: Arc<dyn AgentSink> = Arc::new(SchedulerSink { state: state.clone() });
    let scheduler = Scheduler::new(scheduler_config, sink);
    let _heartbeat = scheduler.spawn_heartbeat_loop();
    let _cron = scheduler.spawn_cron_loop();

    let reap_state = state.clone();
    let nonce_reap_secs = state.config.server.nonce_reap_secs.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(nonce_reap_secs));
        loop {
            interval.tick().await;
            osa_server::reap_expired_nonces(&reap_state);
        }
    });

    let bind = state.config.server.bind.clone();
    let router = osa_server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("binding {bind}"))?;
    tracing::info!(%bind, "osa server listening");
    axum::serve(listener, router).await.context("serving HTTP")?;
    Ok(EXIT_OK)
}

/// Dispatches scheduled agent-message jobs into a single long-lived
/// "scheduler" session (spec §4.16). Shell and webhook jobs never reach
/// this — they're handled directly by `osa_scheduler::Scheduler`.
struct SchedulerSink {
    state: Arc<AppState>,
}

const SCHEDULER_SESSION_ID: &str = "scheduler";

#[async_trait]
impl AgentSink for SchedulerSink {
    async fn dispatch(&self, text: &str) -> anyhow::Result<String> {
        if !self.state.sessions.whereis(SCHEDULER_SESSION_ID) {
            let agent = self.state.build_agent("scheduler")?;
            self.state.sessions.ensure_loop(SCHEDULER_SESSION_ID, agent).await;
        }

        let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
        let collect = tokio::spawn(async move {
            let mut output = String::new();
            while let Some(event) = rx.recv().await {
                if let AgentEvent::TextComplete(t) = event {
                    output = t;
                }
            }
            output
        });

        let reply = self.state.sessions.process_message(SCHEDULER_SESSION_ID, text.to_string(), tx).await?;
        if matches!(reply, LoopReply::Busy) {
            collect.abort();
            anyhow::bail!("scheduler session is busy with another job");
        }
        collect.await.context("event collector panicked")
    }
}
