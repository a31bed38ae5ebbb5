// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Append-only session history (spec §4.7, §6: `sessions/<id>/history.jsonl`).
//!
//! Each turn is appended as one JSON object per line. A bounded in-memory
//! tail of the last `K` entries backs fast reads without re-parsing the
//! whole file on every access; `load_session` re-reads the full file only
//! when the caller actually needs more than the tail.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::MemoryError;

/// Default number of recent entries kept in memory per session.
const DEFAULT_TAIL: usize = 50;

/// One line of `sessions/<id>/history.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<serde_json::Value>,
    pub ts: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
            ts: Utc::now(),
        }
    }
}

/// Append-only per-session log, plus an in-memory tail for fast reads.
///
/// Mirrors the task queue's "write-through to durable store, cache in
/// memory" pattern (see DESIGN.md): `append` writes the line to disk first,
/// then pushes onto the tail so a reader never observes the cache ahead of
/// the file.
pub struct SessionLog {
    root: PathBuf,
    tails: DashMap<String, Arc<tokio::sync::Mutex<VecDeque<HistoryEntry>>>>,
    tail_len: usize,
}

impl SessionLog {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            tails: DashMap::new(),
            tail_len: DEFAULT_TAIL,
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id).join("history.jsonl")
    }

    fn tail_for(&self, session_id: &str) -> Arc<tokio::sync::Mutex<VecDeque<HistoryEntry>>> {
        self.tails
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(VecDeque::new())))
            .clone()
    }

    /// Append one entry to `session_id`'s history. Creates the session
    /// directory on first use.
    pub async fn append(&self, session_id: &str, entry: HistoryEntry) -> Result<(), MemoryError> {
        let path = self.path_for(session_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        let tail = self.tail_for(session_id);
        let mut guard = tail.lock().await;
        guard.push_back(entry);
        while guard.len() > self.tail_len {
            guard.pop_front();
        }
        Ok(())
    }

    /// The in-memory tail for `session_id`, oldest first. Empty if the
    /// session has never been loaded or written to in this process.
    pub async fn tail(&self, session_id: &str) -> Vec<HistoryEntry> {
        let tail = self.tail_for(session_id);
        tail.lock().await.iter().cloned().collect()
    }

    /// Read the full on-disk history for `session_id`, oldest first.
    /// Returns `NotFound` when no log file exists at all.
    pub async fn load_session(&self, session_id: &str) -> Result<Vec<HistoryEntry>, MemoryError> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Err(MemoryError::NotFound);
        }
        let text = tokio::fs::read_to_string(&path).await?;
        let mut entries = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }

    /// Resume a session: load its history from disk and warm the in-memory
    /// tail from it. Returns `NotFound` (not an error the caller should
    /// treat as fatal) when the session has no durable log yet — a fresh
    /// session simply starts empty (spec §4.7).
    pub async fn resume_session(&self, session_id: &str) -> Result<Vec<HistoryEntry>, MemoryError> {
        let entries = self.load_session(session_id).await?;
        let tail = self.tail_for(session_id);
        let mut guard = tail.lock().await;
        guard.clear();
        for entry in entries.iter().rev().take(self.tail_len).rev() {
            guard.push_back(entry.clone());
        }
        Ok(entries)
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// `true` if a durable history file exists for `session_id`.
    pub fn exists(&self, session_id: &str) -> bool {
        self.path_for(session_id).exists()
    }
}

/// Convenience constructor rooted at `<osa_home>/sessions`.
pub fn default_root(osa_home: &Path) -> PathBuf {
    osa_home.join("sessions")
}
