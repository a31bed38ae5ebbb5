// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Noise filter (spec §4.5): a two-tier gate run before the agent loop.
//!
//! Tier 1 is deterministic and target-sub-millisecond: explicit short-circuit
//! cases plus a pre-weight heuristic. Tier 2 is an optional LLM call invoked
//! only for pre-weights in a configurable borderline band, with its result
//! cached on text-hash. `filter` itself (ignoring the Tier-2 callback) is
//! deterministic (spec testable property #10).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of the noise filter for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// Message is noise; `reason` names why and `canned_reply` is the
    /// (possibly empty) reply to emit without reaching the agent loop.
    Noise {
        reason: &'static str,
        canned_reply: Option<&'static str>,
    },
    /// Message reaches the agent loop with the computed final weight.
    Signal { weight: f32 },
}

const URGENCY_KEYWORDS: &[&str] = &["urgent", "critical", "emergency"];
const COMMAND_VERBS: &[&str] = &["build", "fix", "run"];

/// Shared with [`crate::compact`]'s importance weighting so "acknowledgement"
/// means the same thing in both the noise filter and the compactor.
pub(crate) const ACK_WORDS: &[&str] = &[
    "ok", "okay", "k", "kk", "thanks", "thank you", "thx", "ty", "cool", "nice", "great",
    "sure", "yep", "yes", "no", "nope", "sounds good", "got it", "understood", "ack",
];

/// Canned replies for certain `{noise, reason}` outcomes (spec §4.5).
fn canned_reply_for(reason: &'static str, text: &str) -> Option<&'static str> {
    match reason {
        "acknowledgement" if text.trim().eq_ignore_ascii_case("ok") => Some("👍"),
        "acknowledgement" => Some("👍"),
        "emoji_only" => Some("👍"),
        _ => None,
    }
}

fn is_emoji_only(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed.chars().all(|c| {
            let cp = c as u32;
            (0x1F300..=0x1FAFF).contains(&cp)
                || (0x2600..=0x27BF).contains(&cp)
                || c.is_whitespace()
        })
}

fn is_single_word(text: &str) -> bool {
    text.split_whitespace().count() == 1
}

/// Tier 1: deterministic gate plus pre-weight heuristic (spec §4.5).
///
/// `last_user_message` + `last_message_age` support the "duplicate of the
/// last user message within N seconds" short-circuit.
pub fn tier1(
    text: &str,
    last_user_message: Option<&str>,
    last_message_age: Option<Duration>,
    dedup_window: Duration,
) -> FilterOutcome {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return FilterOutcome::Noise {
            reason: "empty",
            canned_reply: None,
        };
    }
    if trimmed.len() < 3 {
        return FilterOutcome::Noise {
            reason: "too_short",
            canned_reply: None,
        };
    }
    if let (Some(last), Some(age)) = (last_user_message, last_message_age) {
        if age < dedup_window && trimmed.eq_ignore_ascii_case(last.trim()) {
            return FilterOutcome::Noise {
                reason: "duplicate",
                canned_reply: None,
            };
        }
    }
    if is_emoji_only(trimmed) {
        return FilterOutcome::Noise {
            reason: "emoji_only",
            canned_reply: canned_reply_for("emoji_only", trimmed),
        };
    }
    let lower = trimmed.to_lowercase();
    if is_single_word(trimmed) && ACK_WORDS.contains(&lower.as_str()) {
        return FilterOutcome::Noise {
            reason: "acknowledgement",
            canned_reply: canned_reply_for("acknowledgement", trimmed),
        };
    }
    if ACK_WORDS.iter().any(|a| lower == *a) {
        return FilterOutcome::Noise {
            reason: "acknowledgement",
            canned_reply: canned_reply_for("acknowledgement", trimmed),
        };
    }

    FilterOutcome::Signal {
        weight: pre_weight(trimmed, &lower),
    }
}

fn pre_weight(text: &str, lower: &str) -> f32 {
    let mut weight = 0.2f32;
    if URGENCY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        weight += 0.2;
    }
    if text.trim_end().ends_with('?') {
        weight += 0.15;
    }
    if COMMAND_VERBS.iter().any(|v| lower.starts_with(v)) {
        weight += 0.1;
    }
    let length_bonus = (text.len() as f32 / 500.0).min(0.3);
    weight += length_bonus;
    weight.clamp(0.0, 1.0)
}

/// Configurable Tier-2 borderline band (spec §4.5 default 0.3–0.6).
#[derive(Debug, Clone, Copy)]
pub struct Tier2Band {
    pub low: f32,
    pub high: f32,
}

impl Default for Tier2Band {
    fn default() -> Self {
        Self { low: 0.3, high: 0.6 }
    }
}

struct CachedResult {
    weight: f32,
    inserted: Instant,
}

const TIER2_CACHE_TTL: Duration = Duration::from_secs(300);

/// Caches Tier-2 LLM results on raw message text with a TTL (spec §4.5, §9:
/// memory only, does not persist across restarts). Keyed on the text
/// verbatim — no Unicode normalization is applied, so two messages that are
/// canonically equivalent but byte-distinct (e.g. composed vs. decomposed
/// accented characters) miss the cache rather than collide. Normalizing
/// first would need `unicode-normalization`, which isn't a dependency
/// anywhere in this workspace; see DESIGN.md's C2/C5 entries.
#[derive(Default)]
pub struct Tier2Cache {
    entries: Mutex<HashMap<String, CachedResult>>,
}

impl Tier2Cache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<f32> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|e| e.inserted.elapsed() < TIER2_CACHE_TTL)
            .map(|e| e.weight)
    }

    fn put(&self, key: &str, weight: f32) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            CachedResult {
                weight,
                inserted: Instant::now(),
            },
        );
    }
}

/// Run the full two-tier filter. `tier2` is invoked only when the Tier-1
/// pre-weight falls in `band`; its result is cached by `cache` on the raw
/// text. `tier2` itself should be idempotent for caching to behave
/// correctly under repeated calls (spec testable property #10).
pub async fn filter<F, Fut>(
    text: &str,
    last_user_message: Option<&str>,
    last_message_age: Option<Duration>,
    dedup_window: Duration,
    band: Tier2Band,
    cache: &Tier2Cache,
    tier2: F,
) -> FilterOutcome
where
    F: FnOnce(String) -> Fut,
    Fut: std::future::Future<Output = f32>,
{
    let outcome = tier1(text, last_user_message, last_message_age, dedup_window);
    let FilterOutcome::Signal { weight } = outcome else {
        return outcome;
    };
    if weight < band.low || weight > band.high {
        return FilterOutcome::Signal { weight };
    }
    if let Some(cached) = cache.get(text) {
        return FilterOutcome::Signal { weight: cached };
    }
    let refined = tier2(text.to_string()).await.clamp(0.0, 1.0);
    cache.put(text, refined);
    FilterOutcome::Signal { weight: refined }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
