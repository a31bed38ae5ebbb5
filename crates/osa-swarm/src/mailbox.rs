// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-swarm mailbox for inter-agent communication (spec §4.14).
//!
//! Wave N's agents post their finished output here under their own
//! `agent_id`; wave N+1's agents read the whole mailbox to build their
//! payload (pipeline/review/debate). A plain `DashMap` is enough — writers
//! never contend on the same key, and the wave barrier in the orchestrator
//! already guarantees readers run only after writers have finished.

use dashmap::DashMap;

#[derive(Default)]
pub struct Mailbox {
    entries: DashMap<String, String>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, agent_id: &str, output: String) {
        self.entries.insert(agent_id.to_string(), output);
    }

    pub fn get(&self, agent_id: &str) -> Option<String> {
        self.entries.get(agent_id).map(|e| e.clone())
    }

    /// All entries posted so far, in insertion-stable `(agent_id, output)`
    /// pairs sorted by `agent_id` for deterministic synthesis prompts.
    pub fn all(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> =
            self.entries.iter().map(|e| (e.key().clone(), e.value().clone())).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_then_get_round_trips() {
        let mb = Mailbox::new();
        mb.post("a1", "result one".to_string());
        assert_eq!(mb.get("a1").as_deref(), Some("result one"));
    }

    #[test]
    fn all_is_sorted_by_agent_id() {
        let mb = Mailbox::new();
        mb.post("b", "2".to_string());
        mb.post("a", "1".to_string());
        let all = mb.all();
        assert_eq!(all[0].0, "a");
        assert_eq!(all[1].0, "b");
    }
}
