//! Narrow SQLite adapter for the task store: insert, update-by-id,
//! scan-by-status. Kept small enough that swapping the backing store
//! (Postgres, an embedded KV store) only means reimplementing this file.
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::task::{Task, TaskStatus};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    task_id       TEXT PRIMARY KEY,
    agent_id      TEXT NOT NULL,
    payload       TEXT NOT NULL,
    status        TEXT NOT NULL,
    leased_until  TEXT,
    leased_by     TEXT,
    result        TEXT,
    error         TEXT,
    attempts      INTEGER NOT NULL,
    max_attempts  INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    completed_at  TEXT,
    updated_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS tasks_agent_status ON tasks(agent_id, status, created_at);
"#;

pub fn open(path: &std::path::Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

pub fn insert(conn: &Connection, t: &Task) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO tasks (task_id, agent_id, payload, status, leased_until, leased_by,
            result, error, attempts, max_attempts, created_at, completed_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            t.task_id,
            t.agent_id,
            t.payload.to_string(),
            t.status.as_str(),
            t.leased_until.map(|d| d.to_rfc3339()),
            t.leased_by,
            t.result.as_ref().map(|r| r.to_string()),
            t.error,
            t.attempts,
            t.max_attempts,
            t.created_at.to_rfc3339(),
            t.completed_at.map(|d| d.to_rfc3339()),
            t.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Replace a task row wholesale; cheaper to reason about than a handful of
/// partial `UPDATE`s since every mutating op already holds the full `Task`.
pub fn update(conn: &Connection, t: &Task) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE tasks SET agent_id=?2, payload=?3, status=?4, leased_until=?5, leased_by=?6,
            result=?7, error=?8, attempts=?9, max_attempts=?10, completed_at=?11, updated_at=?12
         WHERE task_id=?1",
        params![
            t.task_id,
            t.agent_id,
            t.payload.to_string(),
            t.status.as_str(),
            t.leased_until.map(|d| d.to_rfc3339()),
            t.leased_by,
            t.result.as_ref().map(|r| r.to_string()),
            t.error,
            t.attempts,
            t.max_attempts,
            t.completed_at.map(|d| d.to_rfc3339()),
            t.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, task_id: &str) -> rusqlite::Result<Option<Task>> {
    conn.query_row(
        "SELECT task_id, agent_id, payload, status, leased_until, leased_by, result, error,
                attempts, max_attempts, created_at, completed_at, updated_at
         FROM tasks WHERE task_id = ?1",
        params![task_id],
        row_to_task,
    )
    .optional()
}

/// Reload everything not yet terminal (boot-time cache warm: `pending` and
/// `leased` tasks, per spec's "reload on boot" requirement).
pub fn scan_active(conn: &Connection) -> rusqlite::Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT task_id, agent_id, payload, status, leased_until, leased_by, result, error,
                attempts, max_attempts, created_at, completed_at, updated_at
         FROM tasks WHERE status IN ('pending', 'leased')",
    )?;
    let rows = stmt.query_map([], row_to_task)?;
    rows.collect()
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let status_str: String = row.get(3)?;
    let leased_until: Option<String> = row.get(4)?;
    let result_str: Option<String> = row.get(6)?;
    let created_at: String = row.get(10)?;
    let completed_at: Option<String> = row.get(11)?;
    let updated_at: String = row.get(12)?;
    Ok(Task {
        task_id: row.get(0)?,
        agent_id: row.get(1)?,
        payload: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(serde_json::Value::Null),
        status: TaskStatus::from_str(&status_str),
        leased_until: leased_until.and_then(|s| parse_rfc3339(&s)),
        leased_by: row.get(5)?,
        result: result_str.and_then(|s| s.parse().ok()),
        error: row.get(7)?,
        attempts: row.get(8)?,
        max_attempts: row.get(9)?,
        created_at: parse_rfc3339(&created_at).unwrap_or_else(Utc::now),
        completed_at: completed_at.and_then(|s| parse_rfc3339(&s)),
        updated_at: parse_rfc3339(&updated_at).unwrap_or_else(Utc::now),
    })
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}
