// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Keyword-indexed long-term memory (spec §4.7, §6: `memory.jsonl`).
//!
//! `remember` writes through to a SQLite/FTS5-backed store (same pattern as
//! `osa-queue`'s durable-store-then-cache discipline); `recall_relevant`
//! narrows candidates with FTS5 then scores them by keyword overlap ×
//! recency × importance, trimming the formatted result to the caller's
//! token budget so raw user text is never handed back unbounded.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::long_term_store;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "to", "of", "in", "on", "for",
    "and", "or", "but", "with", "at", "by", "from", "that", "this", "it", "as", "i", "you",
];

/// One long-term memory entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub text: String,
    pub category: String,
    pub importance: f32,
    pub keywords: Vec<String>,
    pub ts: DateTime<Utc>,
}

/// Extract lowercase, stopword-free keyword tokens from free text.
pub fn extract_keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

pub struct LongTermMemory {
    conn: StdMutex<Option<Connection>>,
}

impl LongTermMemory {
    /// Open (or create) the SQLite-backed store at `path`. A failure to
    /// open degrades to an in-memory-only (non-durable) store with a
    /// logged warning, matching `osa-queue`'s degrade-not-fail posture.
    pub async fn open(path: PathBuf) -> Self {
        let conn = tokio::task::spawn_blocking(move || match long_term_store::open(&path) {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!(error = %e, "long-term memory store unreachable, degrading to memory-only");
                None
            }
        })
        .await
        .unwrap_or(None);
        Self { conn: StdMutex::new(conn) }
    }

    pub fn in_memory() -> Self {
        let conn = Connection::open_in_memory().ok().and_then(|c| {
            c.execute_batch(
                "CREATE TABLE IF NOT EXISTS entries (
                    id        INTEGER PRIMARY KEY AUTOINCREMENT,
                    text      TEXT NOT NULL,
                    category  TEXT NOT NULL,
                    importance REAL NOT NULL,
                    keywords  TEXT NOT NULL,
                    ts        TEXT NOT NULL
                );
                CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(
                    text, keywords, content='entries', content_rowid='id'
                );
                CREATE TRIGGER IF NOT EXISTS entries_ai AFTER INSERT ON entries BEGIN
                    INSERT INTO entries_fts(rowid, text, keywords) VALUES (new.id, new.text, new.keywords);
                END;",
            )
            .ok()?;
            Some(c)
        });
        Self { conn: StdMutex::new(conn) }
    }

    /// Record a new long-term entry (spec §4.7 `remember(text, category)`).
    /// `importance` defaults to 0.5 when the caller has no stronger signal.
    pub async fn remember(&self, text: &str, category: &str) {
        self.remember_with_importance(text, category, 0.5).await;
    }

    pub async fn remember_with_importance(&self, text: &str, category: &str, importance: f32) {
        let entry = Entry {
            text: text.to_string(),
            category: category.to_string(),
            importance: importance.clamp(0.0, 1.0),
            keywords: extract_keywords(text),
            ts: Utc::now(),
        };
        let conn_arc = &self.conn;
        let guard = conn_arc.lock().unwrap();
        if let Some(conn) = guard.as_ref() {
            if let Err(e) = long_term_store::insert(conn, &entry) {
                warn!(error = %e, "failed to persist long-term memory entry");
            }
        }
    }

    /// Score and format entries relevant to `query`, trimmed to fit
    /// `token_budget` (spec §4.7 `recall_relevant`). Returns an empty string
    /// when nothing matches or the store is unavailable — never raises.
    pub fn recall_relevant(&self, query: &str, token_budget: usize) -> String {
        if token_budget == 0 {
            return String::new();
        }
        let guard = self.conn.lock().unwrap();
        let Some(conn) = guard.as_ref() else {
            return String::new();
        };
        let candidates = match long_term_store::search(conn, query, 50) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "long-term memory search failed");
                return String::new();
            }
        };
        drop(guard);

        let query_terms: HashSet<String> = extract_keywords(query).into_iter().collect();
        let now = Utc::now();

        let mut scored: Vec<(f32, Entry)> = candidates
            .into_iter()
            .map(|entry| {
                let overlap = entry
                    .keywords
                    .iter()
                    .filter(|k| query_terms.contains(*k))
                    .count() as f32;
                let overlap_score = if query_terms.is_empty() { 1.0 } else { overlap / query_terms.len().max(1) as f32 };
                let age_days = (now - entry.ts).num_seconds().max(0) as f32 / 86_400.0;
                let recency = 1.0 / (1.0 + age_days / 7.0);
                let score = overlap_score * recency * entry.importance.max(0.05);
                (score, entry)
            })
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut out = String::new();
        let mut used_tokens = 0usize;
        for (_, entry) in scored {
            let line = format!("- [{}] {}\n", entry.category, entry.text);
            let line_tokens = osa_core::estimate_tokens(&line);
            if used_tokens + line_tokens > token_budget {
                break;
            }
            out.push_str(&line);
            used_tokens += line_tokens;
        }
        out
    }

    /// All entries currently stored, newest first. Used by the context
    /// assembler's long-term memory digest (spec §4.4) when no specific
    /// query is available yet.
    pub fn all(&self) -> Vec<Entry> {
        let guard = self.conn.lock().unwrap();
        match guard.as_ref() {
            Some(conn) => long_term_store::scan_all(conn).unwrap_or_default(),
            None => Vec::new(),
        }
    }
}
