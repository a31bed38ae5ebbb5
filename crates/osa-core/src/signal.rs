// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Signal classifier (spec §4.6): a pure function `(text, channel) -> Signal`.
//!
//! Deterministic given identical inputs; must not raise on empty/nil input.
//! Mode priority is fixed: `build > execute > analyze > maintain > assist`
//! (spec §9 open question — preserved as documented rather than guessed).

use serde::{Deserialize, Serialize};

/// The action family a message belongs to. Priority for classification is
/// `Build > Execute > Analyze > Maintain > Assist` (spec §3, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Build,
    Execute,
    Analyze,
    Maintain,
    Assist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Direct,
    Inform,
    Commit,
    Decide,
    Express,
}

/// Determined by the inbound channel alone, never by message content
/// (spec §3 invariant, testable property #2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Command,
    Message,
    Notification,
    Document,
    Transcript,
}

/// Immutable 5-tuple classification of one inbound message, plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub mode: Mode,
    pub genre: Genre,
    /// Free-form taxonomy: "question", "issue", "request", …
    pub r#type: String,
    pub format: Format,
    /// Always in `[0.0, 1.0]` (spec testable property #1).
    pub weight: f32,
    pub channel: String,
    pub timestamp: String,
}

/// Maps a channel identifier to its `Format`. Pure function of the channel —
/// content never influences the result (spec §4.6, §3 invariant).
pub fn format_for_channel(channel: &str) -> Format {
    match channel {
        "cli" | "terminal" => Format::Command,
        "webhook" => Format::Notification,
        "document" | "file_upload" => Format::Document,
        "transcript" | "recording" => Format::Transcript,
        // email, telegram, slack, discord, matrix, irc, sse, http, … all
        // default to plain conversational messages.
        _ => Format::Message,
    }
}

const BUILD_KEYWORDS: &[&str] = &[
    "build", "implement", "create", "add feature", "write code", "develop",
];
const EXECUTE_KEYWORDS: &[&str] = &["run", "execute", "deploy", "launch", "start"];
const ANALYZE_KEYWORDS: &[&str] = &[
    "analyze", "analyse", "investigate", "explain", "why", "review", "explore",
];
const MAINTAIN_KEYWORDS: &[&str] = &[
    "fix", "down", "broken", "bug", "crash", "urgent", "critical", "emergency",
    "maintain", "repair",
];

/// Priority-ordered keyword match: build keywords first, then execute,
/// analyze, maintain, defaulting to assist (spec §4.6, §9).
fn classify_mode(lower: &str) -> Mode {
    if BUILD_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Mode::Build
    } else if EXECUTE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Mode::Execute
    } else if ANALYZE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Mode::Analyze
    } else if MAINTAIN_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Mode::Maintain
    } else {
        Mode::Assist
    }
}

fn classify_genre(text: &str, lower: &str) -> Genre {
    if text.trim_end().ends_with('!') {
        Genre::Direct
    } else if lower.contains("decide") || lower.contains("should we") || lower.contains("let's choose") {
        Genre::Decide
    } else if lower.contains("i think") || lower.contains("i feel") || lower.contains("i believe") {
        Genre::Express
    } else if lower.starts_with("fyi") || lower.contains("just so you know") || lower.contains("heads up") {
        Genre::Inform
    } else if is_imperative(lower) {
        Genre::Direct
    } else {
        Genre::Commit
    }
}

const IMPERATIVE_VERBS: &[&str] = &[
    "please", "run ", "build ", "fix ", "create ", "make ", "list ", "show ", "send ",
];

fn is_imperative(lower: &str) -> bool {
    IMPERATIVE_VERBS.iter().any(|v| lower.starts_with(v) || lower.starts_with(v.trim()))
}

const BUG_VOCAB: &[&str] = &[
    "bug", "error", "exception", "crash", "broken", "fails", "failing", "down",
    "urgent", "critical", "emergency", "outage",
];
const REQUEST_VERBS: &[&str] = &["please", "can you", "could you", "run", "build", "fix", "create", "make"];

fn classify_type(text: &str, lower: &str) -> String {
    if text.trim_end().ends_with('?') {
        "question".to_string()
    } else if BUG_VOCAB.iter().any(|k| lower.contains(k)) {
        "issue".to_string()
    } else if REQUEST_VERBS.iter().any(|k| lower.starts_with(k)) {
        "request".to_string()
    } else {
        "statement".to_string()
    }
}

/// Classify `text` received on `channel` at `timestamp` (caller-supplied
/// clock reading, so the function stays deterministic/testable) with a
/// pre-computed noise-filter `weight` (spec §4.6: "weight is the
/// noise-filter's final weight").
///
/// Never raises; empty/nil-equivalent text classifies with a neutral
/// `Assist`/`Commit`/`statement` tuple rather than panicking.
pub fn classify(text: &str, channel: &str, weight: f32, timestamp: impl Into<String>) -> Signal {
    let lower = text.to_lowercase();
    Signal {
        mode: classify_mode(&lower),
        genre: classify_genre(text, &lower),
        r#type: classify_type(text, &lower),
        format: format_for_channel(channel),
        weight: weight.clamp(0.0, 1.0),
        channel: channel.to_string(),
        timestamp: timestamp.into(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_always_in_unit_range() {
        for w in [-5.0, -0.1, 0.0, 0.5, 1.0, 1.1, 50.0] {
            let s = classify("hello", "cli", w, "t");
            assert!((0.0..=1.0).contains(&s.weight));
        }
    }

    #[test]
    fn format_is_pure_function_of_channel() {
        let a = classify("build me a widget", "webhook", 0.5, "t");
        let b = classify("completely different text", "webhook", 0.9, "t");
        assert_eq!(a.format, b.format);
        assert_eq!(a.format, Format::Notification);
    }

    #[test]
    fn cli_channel_is_command_format() {
        let s = classify("anything", "cli", 0.5, "t");
        assert_eq!(s.format, Format::Command);
    }

    #[test]
    fn build_beats_execute_when_both_present() {
        let s = classify("build and then run the service", "cli", 0.5, "t");
        assert_eq!(s.mode, Mode::Build);
    }

    #[test]
    fn execute_beats_analyze_when_both_present() {
        let s = classify("run and analyze the results", "cli", 0.5, "t");
        assert_eq!(s.mode, Mode::Execute);
    }

    #[test]
    fn maintain_keywords_trigger_maintain_mode() {
        let s = classify("URGENT: production is down", "cli", 0.8, "t");
        assert_eq!(s.mode, Mode::Maintain);
        assert_eq!(s.r#type, "issue");
    }

    #[test]
    fn default_mode_is_assist() {
        let s = classify("how's the weather today", "cli", 0.3, "t");
        assert_eq!(s.mode, Mode::Assist);
    }

    #[test]
    fn question_mark_yields_question_type() {
        let s = classify("what time is it?", "cli", 0.3, "t");
        assert_eq!(s.r#type, "question");
    }

    #[test]
    fn empty_text_does_not_panic() {
        let s = classify("", "cli", 0.0, "t");
        assert_eq!(s.mode, Mode::Assist);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let a = classify("fix the login bug", "cli", 0.6, "t1");
        let b = classify("fix the login bug", "cli", 0.6, "t1");
        assert_eq!(a.mode, b.mode);
        assert_eq!(a.genre, b.genre);
        assert_eq!(a.r#type, b.r#type);
    }
}
