// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// Used for config fields that should be enabled unless the user explicitly
/// sets them to `false`.  `#[serde(default)]` on a `bool` always falls back
/// to `bool::default()` (i.e. `false`), so a named function is required.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    /// HTTP/SSE surface (C17) bind address, auth, and swarm limits.
    #[serde(default)]
    pub server: ServerConfig,
    /// Scheduler (C16): heartbeat / cron / trigger file locations.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Named provider configurations.
    ///
    /// Define custom endpoints, local models, or additional accounts here and
    /// reference them by name with `--model <key>` or `--model <key>/<model>`.
    ///
    /// ```yaml
    /// providers:
    ///   my_ollama:
    ///     provider: openai        # uses the OpenAI-compatible wire format
    ///     base_url: http://localhost:11434/v1
    ///     name: llama3.2          # default model for this provider
    ///   work_anthropic:
    ///     provider: anthropic
    ///     api_key_env: WORK_ANTHROPIC_KEY
    ///     name: claude-opus-4-5
    /// ```
    #[serde(default)]
    pub providers: std::collections::HashMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier.  Run `osa list-providers` for the full list.
    /// Common values: "openai" | "anthropic" | "google" | "azure" | "aws" |
    /// "groq" | "openrouter" | "ollama" | "mistral" | "deepseek" | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override.  Useful for local proxies, LiteLLM, or Cloudflare.
    /// For most hosted providers the correct default is auto-selected.
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,

    // ── Azure OpenAI ─────────────────────────────────────────────────────────
    /// Azure resource name (the subdomain of `.openai.azure.com`).
    /// Required when provider = "azure" and base_url is not set.
    pub azure_resource: Option<String>,
    /// Azure deployment name.  Defaults to `model.name` when not set.
    pub azure_deployment: Option<String>,
    /// Azure REST API version string, e.g. `"2024-02-01"`.
    pub azure_api_version: Option<String>,

    // ── AWS Bedrock ───────────────────────────────────────────────────────────
    /// AWS region override (also honoured via AWS_DEFAULT_REGION env var).
    pub aws_region: Option<String>,

    // ── Prompt caching ────────────────────────────────────────────────────────
    /// Attach an explicit cache-control marker to the system message.
    ///
    /// **Anthropic**: adds `"cache_control": {"type": "ephemeral"}` to the
    /// system block, which tells the API to cache the prefix up to and
    /// including that block.  Anthropic charges a one-time write fee and
    /// subsequent calls save ~90% on cached input tokens.
    ///
    /// **Other providers**: OpenAI and Google cache automatically; this flag
    /// has no effect for those providers.
    #[serde(default = "default_true")]
    pub cache_system_prompt: bool,

    /// Use the extended (1-hour) cache TTL instead of the default 5-minute
    /// window.  Applies to the system prompt (when `cache_system_prompt = true`)
    /// and to tool definitions (when `cache_tools = true`).  Only meaningful
    /// for the Anthropic provider.  Sends the
    /// `anthropic-beta: extended-cache-ttl-2025-04-11` header automatically.
    ///
    /// Conversation caching (`cache_conversation`) always uses the 5-minute
    /// TTL regardless of this setting, because conversation turns are
    /// typically frequent enough to keep the cache refreshed within 5 minutes.
    #[serde(default)]
    pub extended_cache_time: bool,

    /// Cache tool definitions using Anthropic prompt caching.
    ///
    /// Tool definitions are stable across requests within a session, making
    /// them ideal for caching.  The last tool in the list receives a
    /// `cache_control` marker so Anthropic caches all tool definitions as a
    /// prefix.  Uses the same TTL as `extended_cache_time` controls (1-hour
    /// when true, 5-minute otherwise).
    ///
    /// With many tools (each ~200-500 tokens), this can save thousands of
    /// tokens per request.
    #[serde(default = "default_true")]
    pub cache_tools: bool,

    /// Enable automatic conversation caching (Anthropic only).
    ///
    /// Adds a top-level `cache_control` marker that instructs Anthropic to
    /// automatically cache conversation history up to the last message.
    /// Subsequent turns read prior context from cache at 10% of the base
    /// token cost, dramatically reducing cost for multi-turn agent sessions.
    ///
    /// The cache breakpoint automatically advances with each new turn so no
    /// manual management is needed.
    #[serde(default = "default_true")]
    pub cache_conversation: bool,

    /// Cache image content blocks in conversation history (Anthropic only).
    ///
    /// Images are token-expensive: even a modest screenshot costs hundreds of
    /// input tokens every turn it remains in context.  Marking the oldest image
    /// blocks with `cache_control` preserves them across turns, saving ~90% on
    /// those tokens for the rest of the session.
    ///
    /// Uses the same TTL tier as `extended_cache_time` controls.  The number
    /// of cached images is bounded by the remaining Anthropic breakpoint budget
    /// (maximum 4 breakpoints total across system, tools, conversation, and
    /// images/tool-results).
    #[serde(default = "default_true")]
    pub cache_images: bool,

    /// Cache large tool results in conversation history (Anthropic only).
    ///
    /// When an agent reads files, runs commands, or fetches documents, those
    /// tool results can consume thousands of tokens on every subsequent turn.
    /// Marking them with `cache_control` once saves ~90% on those tokens for
    /// all following turns.
    ///
    /// A result is eligible when its serialised content exceeds 4 096
    /// characters (~1 024 tokens, the Anthropic minimum cacheable length for
    /// Sonnet-class models).  The oldest eligible results are cached first;
    /// the count is bounded by the remaining breakpoint budget.
    ///
    /// Uses the same TTL tier as `extended_cache_time` controls.
    #[serde(default = "default_true")]
    pub cache_tool_results: bool,

    // ── Provider-specific extras ──────────────────────────────────────────────
    /// Free-form provider-specific options forwarded as-is to the driver.
    /// Useful for headers or parameters not covered by the standard fields.
    #[serde(default)]
    pub driver_options: serde_json::Value,

    // ── Mock provider ─────────────────────────────────────────────────────────
    /// Path to YAML mock-responses file (used when provider = "mock").
    /// Can also be set via the OSA_MOCK_RESPONSES environment variable.
    pub mock_responses_file: Option<String>,

    /// Model-size/tag hints used for tool-gating decisions at the provider
    /// registry boundary (spec §4.9). A provider whose `tool_gate_tags`
    /// includes "small" has its tool schemas hidden from the model.
    #[serde(default)]
    pub tool_gate_tags: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4o".into(),
            // api_key_env is intentionally None here.  resolve_api_key() falls
            // through to the driver registry, which already knows the canonical
            // env-var name for each provider (OPENAI_API_KEY, ANTHROPIC_API_KEY,
            // etc.).  Hard-coding it here would shadow the registry lookup and
            // cause the wrong key to be sent whenever the provider is overridden
            // at the step level (e.g. <!-- osa: provider=anthropic -->).
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
            azure_resource: None,
            azure_deployment: None,
            azure_api_version: None,
            aws_region: None,
            // Comprehensive caching is on by default for every provider that
            // supports it (currently Anthropic).  The flags are no-ops for
            // providers such as OpenAI that cache automatically.  Only the
            // extended (1-hour) TTL remains opt-in because it carries a 2×
            // write cost that is only worthwhile when turns are >5 min apart.
            cache_system_prompt: true,
            extended_cache_time: false,
            cache_tools: true,
            cache_conversation: true,
            cache_images: true,
            cache_tool_results: true,
            driver_options: serde_json::Value::Null,
            mock_responses_file: None,
            tool_gate_tags: Vec::new(),
        }
    }
}

fn default_max_tool_rounds() -> u32 {
    200
}
fn default_compaction_warn_threshold() -> f32 {
    0.80
}
fn default_compaction_aggressive_threshold() -> f32 {
    0.85
}
fn default_compaction_emergency_threshold() -> f32 {
    0.95
}
fn default_compaction_warm_size() -> usize {
    20
}
fn default_max_iterations() -> u32 {
    30
}
fn default_max_consecutive_failures() -> u32 {
    3
}
fn default_noise_band_low() -> f32 {
    0.3
}
fn default_noise_band_high() -> f32 {
    0.6
}
fn default_max_tokens() -> u32 {
    128_000
}
fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}

/// Strategy used when compacting the session context.
///
/// `Structured` (default) instructs the model to produce a typed Markdown
/// checkpoint with fixed sections (Active Task, Key Decisions, Files &
/// Artifacts, Constraints, Pending Items, Session Narrative).  This produces
/// checkpoints that are easier for the model to navigate on future turns.
///
/// `Narrative` uses the original free-form summarisation prompt and is
/// available for backward-compatibility or when a simpler output is preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompactionStrategy {
    #[default]
    Structured,
    Narrative,
}

impl std::fmt::Display for CompactionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompactionStrategy::Structured => write!(f, "structured"),
            CompactionStrategy::Narrative => write!(f, "narrative"),
        }
    }
}

/// Operating mode gating tool availability and system-prompt framing
/// (spec §4.10's `process_message`, §4.8's per-mode tool set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Pure research — read-only tools, no writes.
    Research,
    /// Generate a structured plan, no code changes.
    Plan,
    /// Full agent with read/write tools.
    #[default]
    Agent,
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentMode::Research => write!(f, "research"),
            AgentMode::Plan => write!(f, "plan"),
            AgentMode::Agent => write!(f, "agent"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of autonomous tool-call rounds before stopping.
    /// Kept as a cap on rounds within one `max_iterations` iteration; most
    /// callers only need `max_iterations`.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    /// Maximum agent-loop iterations per `process_message` call (spec §4.10).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Consecutive failures of the same tool name before the loop halts
    /// (spec §9 open question; this implementation counts same-tool-name
    /// failures, documented in DESIGN.md).
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Lower bound of the noise-filter Tier-2 borderline band.
    #[serde(default = "default_noise_band_low")]
    pub noise_band_low: f32,
    /// Upper bound of the noise-filter Tier-2 borderline band.
    #[serde(default = "default_noise_band_high")]
    pub noise_band_high: f32,
    /// Session token budget ceiling (spec §6 `max_tokens`, default 128000).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Default provider key used when a request does not specify one.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Default model name used when a request does not specify one.
    /// Resolved from the active provider's own config — never from an
    /// unrelated environment variable.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Run shell/tool execution inside a sandbox (Docker) when true.
    #[serde(default)]
    pub sandbox_enabled: bool,
    /// Daily spend cap in USD enforced by the budget-tracker hook (C15).
    #[serde(default)]
    pub daily_budget_usd: Option<f64>,
    /// Monthly spend cap in USD enforced by the budget-tracker hook (C15).
    #[serde(default)]
    pub monthly_budget_usd: Option<f64>,
    /// Per-call spend cap in USD enforced by the budget-tracker hook (C15).
    #[serde(default)]
    pub per_call_budget_usd: Option<f64>,
    /// Token fraction at which proactive (background) compaction triggers,
    /// compacting down to roughly 70% usage (spec §4.3 "warn" tier). The
    /// budget gate compares effective tokens (calibrated estimate + schema
    /// overhead) against the model's usable input budget, which is
    /// context_window minus max_output_tokens.
    #[serde(default = "default_compaction_warn_threshold")]
    pub compaction_warn_threshold: f32,
    /// Token fraction at which aggressive compaction triggers, compacting
    /// down to roughly 60% usage (spec §4.3 "aggressive" tier).
    #[serde(default = "default_compaction_aggressive_threshold")]
    pub compaction_aggressive_threshold: f32,
    /// Token fraction at which emergency compaction triggers: deterministic,
    /// importance-weighted truncation down to roughly 50% usage, with no LLM
    /// round-trip and license to drop older tool results (spec §4.3
    /// "emergency" tier).
    #[serde(default = "default_compaction_emergency_threshold")]
    pub compaction_emergency_threshold: f32,
    /// Number of recent non-system messages preserved verbatim during
    /// compaction — the HOT zone (spec §4.3).  The oldest messages beyond
    /// this tail are summarised by the LLM.  Higher values retain more
    /// recent context but reduce the compression benefit.
    ///
    /// A value of 6 corresponds to roughly 3 back-and-forth turns
    /// (user + assistant per turn, tool results excluded from the count).
    /// Set to 0 to summarise the full history (original behaviour).
    #[serde(default = "default_compaction_keep_recent")]
    pub compaction_keep_recent: usize,
    /// Number of messages just older than the HOT zone kept as the WARM zone
    /// (spec §4.3: "next M messages, default 11-30") and summarised per-role
    /// on the next model turn. Everything older than HOT+WARM is the COLD
    /// zone, collapsed deterministically into a key-facts digest.
    #[serde(default = "default_compaction_warm_size")]
    pub compaction_warm_size: usize,
    /// Compaction checkpoint format.
    ///
    /// `structured` (default): produces a typed Markdown checkpoint with
    /// fixed sections preserving tasks, decisions, files, and constraints.
    /// `narrative`: uses the original free-form summarisation prompt.
    #[serde(default)]
    pub compaction_strategy: CompactionStrategy,
    /// Maximum tokens allowed for a single tool result before it is
    /// deterministically truncated before entering the session.
    ///
    /// Truncation is content-aware: shell output keeps head+tail lines, grep
    /// keeps leading matches, read_file keeps head+tail lines.  A value of
    /// 0 disables per-result truncation entirely.
    #[serde(default = "default_tool_result_token_cap")]
    pub tool_result_token_cap: usize,
    /// Fraction of the context window reserved for tool schemas, the dynamic
    /// context block (git/CI info), and measurement error in the token
    /// approximation.  Reduces the effective compaction trigger threshold.
    ///
    /// Example: threshold=0.85, reserve=0.10 → compaction fires when
    /// calibrated session tokens reach 75% of the input budget.
    #[serde(default = "default_compaction_overhead_reserve")]
    pub compaction_overhead_reserve: f32,
    /// System prompt override; leave None to use the built-in prompt
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Per-step wall-clock timeout in seconds (0 = no limit).
    /// Can be set in config, overridden by frontmatter or CLI flag.
    #[serde(default)]
    pub max_step_timeout_secs: u64,

    /// Total run wall-clock timeout in seconds (0 = no limit).
    #[serde(default)]
    pub max_run_timeout_secs: u64,

    /// Operating mode a fresh session starts in.
    #[serde(default)]
    pub default_mode: AgentMode,
}

fn default_compaction_keep_recent() -> usize {
    6
}
fn default_tool_result_token_cap() -> usize {
    4000
}
fn default_compaction_overhead_reserve() -> f32 {
    0.10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 200,
            max_iterations: default_max_iterations(),
            max_consecutive_failures: default_max_consecutive_failures(),
            noise_band_low: default_noise_band_low(),
            noise_band_high: default_noise_band_high(),
            max_tokens: default_max_tokens(),
            default_provider: default_provider(),
            default_model: default_model(),
            sandbox_enabled: false,
            daily_budget_usd: None,
            monthly_budget_usd: None,
            per_call_budget_usd: None,
            compaction_warn_threshold: default_compaction_warn_threshold(),
            compaction_aggressive_threshold: default_compaction_aggressive_threshold(),
            compaction_emergency_threshold: default_compaction_emergency_threshold(),
            compaction_keep_recent: default_compaction_keep_recent(),
            compaction_warm_size: default_compaction_warm_size(),
            compaction_strategy: CompactionStrategy::Structured,
            tool_result_token_cap: default_tool_result_token_cap(),
            compaction_overhead_reserve: default_compaction_overhead_reserve(),
            system_prompt: None,
            max_step_timeout_secs: 0,
            max_run_timeout_secs: 0,
            default_mode: AgentMode::Agent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Automatically approve shell commands matching these glob patterns
    pub auto_approve_patterns: Vec<String>,
    /// Block shell commands matching these glob patterns
    pub deny_patterns: Vec<String>,
    /// Timeout in seconds for a single tool call
    pub timeout_secs: u64,
    /// Use Docker sandbox for shell execution
    pub use_docker: bool,
    /// Docker image to use when use_docker is true
    pub docker_image: Option<String>,
    /// Web fetch and search configuration
    #[serde(default)]
    pub web: WebConfig,
    /// Persistent memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Linter configuration
    #[serde(default)]
    pub lints: LintsConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            auto_approve_patterns: vec![
                "cat *".into(),
                "ls *".into(),
                "find *".into(),
                "rg *".into(),
                "grep *".into(),
            ],
            deny_patterns: vec!["rm -rf /*".into(), "dd if=*".into()],
            timeout_secs: 30,
            use_docker: false,
            docker_image: None,
            web: WebConfig::default(),
            memory: MemoryConfig::default(),
            lints: LintsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Brave Search API key (also checked via BRAVE_API_KEY env var)
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Search backend configuration
    #[serde(default)]
    pub search: WebSearchConfig,
    /// Default maximum characters for web_fetch (default 50000)
    pub fetch_max_chars: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            search: WebSearchConfig::default(),
            fetch_max_chars: 50_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Path to the memory JSON file (default: ~/.config/osa/memory.json)
    pub memory_file: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintsConfig {
    /// Override the lint command for Rust projects
    pub rust_command: Option<String>,
    /// Override the lint command for TypeScript/JS projects
    pub typescript_command: Option<String>,
    /// Override the lint command for Python projects
    pub python_command: Option<String>,
}

/// HTTP/SSE surface configuration (spec §4.17, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, overridden by `OSA_HTTP_PORT` (port only; host is fixed
    /// at `0.0.0.0`) and by `osa serve --port`.
    #[serde(default = "default_http_bind")]
    pub bind: String,
    /// Require `X-OSA-Signature` / `X-OSA-Timestamp` / `X-OSA-Nonce` request
    /// signing, overridden by `OSA_REQUIRE_AUTH`.
    #[serde(default)]
    pub require_auth: bool,
    /// Shared HMAC secret used for request signing when `require_auth` is
    /// set.  Read from config or the `OSA_HMAC_SECRET` environment variable;
    /// never generated automatically (spec: no secret management beyond
    /// config/env transit).
    #[serde(default)]
    pub hmac_secret: Option<String>,
    /// Request timestamp tolerance window in seconds (spec §4.17: ±300s).
    #[serde(default = "default_auth_window_secs")]
    pub auth_window_secs: i64,
    /// Nonce replay-table reap interval in seconds (spec §4.17: 60s).
    #[serde(default = "default_nonce_reap_secs")]
    pub nonce_reap_secs: u64,
    /// Maximum concurrent swarms per process (spec §4.14).
    #[serde(default = "default_max_concurrent_swarms")]
    pub max_concurrent_swarms: usize,
    /// Maximum agents per swarm (spec §4.14).
    #[serde(default = "default_max_agents_per_swarm")]
    pub max_agents_per_swarm: usize,
    /// Per-swarm wall-clock timeout in seconds (spec §4.14, §5: 300s).
    #[serde(default = "default_swarm_timeout_secs")]
    pub swarm_timeout_secs: u64,
    /// SSE keepalive comment interval in seconds (spec §4.17: 30s).
    #[serde(default = "default_sse_keepalive_secs")]
    pub sse_keepalive_secs: u64,
}

fn default_http_bind() -> String {
    "0.0.0.0:8787".into()
}
fn default_auth_window_secs() -> i64 {
    300
}
fn default_nonce_reap_secs() -> u64 {
    60
}
fn default_max_concurrent_swarms() -> usize {
    10
}
fn default_max_agents_per_swarm() -> usize {
    10
}
fn default_swarm_timeout_secs() -> u64 {
    300
}
fn default_sse_keepalive_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            require_auth: false,
            hmac_secret: None,
            auth_window_secs: default_auth_window_secs(),
            nonce_reap_secs: default_nonce_reap_secs(),
            max_concurrent_swarms: default_max_concurrent_swarms(),
            max_agents_per_swarm: default_max_agents_per_swarm(),
            swarm_timeout_secs: default_swarm_timeout_secs(),
            sse_keepalive_secs: default_sse_keepalive_secs(),
        }
    }
}

/// Scheduler (C16) file locations and tick intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Path to the heartbeat checklist (spec §6 `HEARTBEAT.md`).
    #[serde(default = "default_heartbeat_path")]
    pub heartbeat_file: String,
    /// Path to the cron job list (spec §6 `CRONS.json`).
    #[serde(default = "default_crons_path")]
    pub crons_file: String,
    /// Path to the HTTP-trigger definitions (spec §6 `TRIGGERS.json`).
    #[serde(default = "default_triggers_path")]
    pub triggers_file: String,
    /// Heartbeat scan interval in seconds (spec §4.16: 30 min).
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Consecutive failures before a job's circuit breaker opens (spec §4.16).
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    /// Shell job wall-clock timeout in seconds (spec §4.16: 30s).
    #[serde(default = "default_shell_job_timeout_secs")]
    pub shell_job_timeout_secs: u64,
    /// Shell job output cap in bytes (spec §4.16: 100 KB).
    #[serde(default = "default_shell_job_output_cap")]
    pub shell_job_output_cap: usize,
}

fn default_heartbeat_path() -> String {
    "HEARTBEAT.md".into()
}
fn default_crons_path() -> String {
    "CRONS.json".into()
}
fn default_triggers_path() -> String {
    "TRIGGERS.json".into()
}
fn default_heartbeat_interval_secs() -> u64 {
    1800
}
fn default_circuit_breaker_threshold() -> u32 {
    3
}
fn default_shell_job_timeout_secs() -> u64 {
    30
}
fn default_shell_job_output_cap() -> usize {
    100 * 1024
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_file: default_heartbeat_path(),
            crons_file: default_crons_path(),
            triggers_file: default_triggers_path(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            shell_job_timeout_secs: default_shell_job_timeout_secs(),
            shell_job_output_cap: default_shell_job_output_cap(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
