// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! SQLite/FTS5 backing for [`crate::LongTermMemory`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::long_term::Entry;

pub fn open(path: &std::path::Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
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
    )?;
    Ok(conn)
}

pub fn insert(conn: &Connection, entry: &Entry) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO entries (text, category, importance, keywords, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.text,
            entry.category,
            entry.importance,
            entry.keywords.join(","),
            entry.ts.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Keyword-match candidates for `query` via FTS5, newest first, capped at
/// `limit` rows. Scoring (keyword overlap × recency × importance) happens
/// in [`crate::long_term`] once rows are loaded — this layer only narrows
/// the candidate set so recall stays cheap on a large memory file.
pub fn search(conn: &Connection, query: &str, limit: usize) -> rusqlite::Result<Vec<Entry>> {
    // FTS5 query syntax chokes on punctuation; reduce to an OR of bare terms.
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();
    if terms.is_empty() {
        return Ok(Vec::new());
    }
    let match_expr = terms.join(" OR ");

    let mut stmt = conn.prepare(
        "SELECT e.text, e.category, e.importance, e.keywords, e.ts
         FROM entries_fts f JOIN entries e ON e.id = f.rowid
         WHERE entries_fts MATCH ?1
         ORDER BY e.ts DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![match_expr, limit as i64], |row| {
        let ts_str: String = row.get(4)?;
        let keywords_str: String = row.get(3)?;
        Ok(Entry {
            text: row.get(0)?,
            category: row.get(1)?,
            importance: row.get(2)?,
            keywords: keywords_str.split(',').filter(|s| !s.is_empty()).map(String::from).collect(),
            ts: DateTime::parse_from_rfc3339(&ts_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    })?;
    rows.collect()
}

/// All entries, newest first (used when warming the in-memory scan cache
/// at boot, and by tests).
pub fn scan_all(conn: &Connection) -> rusqlite::Result<Vec<Entry>> {
    let mut stmt = conn.prepare("SELECT text, category, importance, keywords, ts FROM entries ORDER BY ts DESC")?;
    let rows = stmt.query_map([], |row| {
        let ts_str: String = row.get(4)?;
        let keywords_str: String = row.get(3)?;
        Ok(Entry {
            text: row.get(0)?,
            category: row.get(1)?,
            importance: row.get(2)?,
            keywords: keywords_str.split(',').filter(|s| !s.is_empty()).map(String::from).collect(),
            ts: DateTime::parse_from_rfc3339(&ts_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    })?;
    rows.collect()
}
