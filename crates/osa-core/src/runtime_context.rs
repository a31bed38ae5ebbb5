// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Runtime context for an agent session.
//!
//! This is separate from [`osa_config::AgentConfig`], which holds only
//! config-file fields. [`AgentRuntimeContext`] carries the inputs the
//! context assembler (§4.4) needs but cannot discover itself: which channel
//! this session is bound to, which provider/model is active, bootstrap file
//! contents, the machine addendum, and the currently active skill list.
//! Discovery of those inputs (walking the filesystem for skill markdown,
//! reading bootstrap files) is an external concern — out of scope for the
//! core (spec §1) — so this struct only holds the already-resolved values.

use crate::prompts::SkillDescriptor;

/// Environment-detected context injected into an agent at construction time.
#[derive(Debug, Default, Clone)]
pub struct AgentRuntimeContext {
    /// The inbound channel this session is bound to (spec §3: determines
    /// `Signal::format`; also rendered in the runtime block).
    pub channel: String,
    /// Name of the active provider, for the runtime block (spec §4.4 item 7).
    pub provider_name: String,
    /// Name of the active model, for the runtime block.
    pub model_name: String,
    /// Bootstrap file contents (identity, soul/personality, user
    /// preferences), concatenated verbatim in order when present
    /// (spec §4.4 item 2).
    pub bootstrap_files: Vec<String>,
    /// Per-machine activated skill set preamble (spec §4.4 item 4).
    pub machine_addendum: Option<String>,
    /// Active skills: name + one-line description (spec §4.4 item 5).
    pub skills: Vec<SkillDescriptor>,
    /// Full system prompt override. When set, replaces the assembled
    /// system message entirely.
    pub system_prompt_override: Option<String>,
}
