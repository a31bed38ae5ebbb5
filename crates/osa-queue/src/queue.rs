use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use rusqlite::Connection;
use tracing::warn;
use uuid::Uuid;

use crate::store;
use crate::task::{Task, TaskStatus};

const REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// Durable, leased, retryable FIFO-per-agent queue (spec §4.12).
///
/// Every mutating operation writes through to SQLite first, then updates the
/// in-memory cache that actually answers `lease`/`get_task`/`list`. If the
/// store connection was never opened (or a write fails), the queue logs a
/// warning and keeps serving the cache only — degraded, not dead.
pub struct TaskQueue {
    conn: Arc<StdMutex<Option<Connection>>>,
    cache: Arc<DashMap<String, Task>>,
}

impl TaskQueue {
    /// Open (or create) the SQLite-backed queue at `path` and warm the cache
    /// from every non-terminal row. A failure to open the database degrades
    /// to memory-only rather than failing construction — the queue is still
    /// useful for a single process run even with a read-only filesystem.
    pub async fn open(path: PathBuf) -> Self {
        let (conn, warm) = tokio::task::spawn_blocking(move || match store::open(&path) {
            Ok(conn) => {
                let rows = store::scan_active(&conn).unwrap_or_default();
                (Some(conn), rows)
            }
            Err(e) => {
                warn!(error = %e, "task queue store unreachable, degrading to memory-only");
                (None, Vec::new())
            }
        })
        .await
        .unwrap_or((None, Vec::new()));

        let cache = Arc::new(DashMap::new());
        for t in warm {
            cache.insert(t.task_id.clone(), t);
        }

        TaskQueue {
            conn: Arc::new(StdMutex::new(conn)),
            cache,
        }
    }

    /// An in-memory-only queue, for tests and for callers who don't need
    /// durability across restarts.
    pub fn in_memory() -> Self {
        TaskQueue {
            conn: Arc::new(StdMutex::new(None)),
            cache: Arc::new(DashMap::new()),
        }
    }

    async fn write_through<F>(&self, f: F)
    where
        F: FnOnce(&Connection) -> rusqlite::Result<()> + Send + 'static,
    {
        let conn_arc = self.conn.clone();
        let result = tokio::task::spawn_blocking(move || {
            let guard = conn_arc.lock().unwrap();
            match guard.as_ref() {
                Some(conn) => Some(f(conn)),
                None => None,
            }
        })
        .await;
        match result {
            Ok(Some(Err(e))) => warn!(error = %e, "task queue write-through failed, cache is now ahead of the store"),
            Ok(Some(Ok(()))) => {}
            Ok(None) => {}
            Err(e) => warn!(error = %e, "task queue write-through task panicked"),
        }
    }

    /// Enqueue a task under a caller-supplied `task_id` (spec §3: task ids
    /// are unique and caller-supplied, not generated here). Returns the
    /// assigned task id unchanged, for callers that only need to confirm
    /// acceptance.
    pub async fn enqueue(
        &self,
        task_id: &str,
        agent_id: &str,
        payload: serde_json::Value,
        max_attempts: u32,
    ) -> String {
        self.enqueue_sync(task_id, agent_id, payload, max_attempts).await.task_id
    }

    /// Same as [`enqueue`] but returns the full [`Task`] struct, for callers
    /// (orchestrators) that must inspect the created row — e.g. to read back
    /// `created_at` for ordering (spec §4.12's `enqueue_sync`).
    pub async fn enqueue_sync(
        &self,
        task_id: &str,
        agent_id: &str,
        payload: serde_json::Value,
        max_attempts: u32,
    ) -> Task {
        let task = Task::new(task_id.to_string(), agent_id.to_string(), payload, max_attempts);
        self.cache.insert(task.task_id.clone(), task.clone());
        let stored = task.clone();
        self.write_through(move |conn| store::insert(conn, &stored)).await;
        task
    }

    /// Enqueue under a fresh random id, for callers that don't care what the
    /// id is (kept for convenience; most callers know their own task id).
    pub async fn enqueue_generated(&self, agent_id: &str, payload: serde_json::Value, max_attempts: u32) -> String {
        self.enqueue(&Uuid::new_v4().to_string(), agent_id, payload, max_attempts).await
    }

    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.cache.get(task_id).map(|e| e.clone())
    }

    /// List every task currently known for `agent_id`, oldest first.
    pub fn list(&self, agent_id: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .cache
            .iter()
            .filter(|e| e.agent_id == agent_id)
            .map(|e| e.clone())
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Atomically lease the oldest pending task for `agent_id`, if any.
    ///
    /// `DashMap::get_mut` holds an exclusive per-shard lock for the duration
    /// of the check-and-set, so two concurrent callers racing for the same
    /// task id can never both observe `Pending` — the loser retries against
    /// the next-oldest candidate (or finds none and returns `None`).
    pub async fn lease(&self, agent_id: &str, lease_ms: u64) -> Option<Task> {
        loop {
            let candidate = self
                .cache
                .iter()
                .filter(|e| e.agent_id == agent_id && e.status == TaskStatus::Pending)
                .min_by_key(|e| e.created_at)
                .map(|e| e.task_id.clone());
            let task_id = candidate?;

            let now = Utc::now();
            let leased_until = now + chrono::Duration::milliseconds(lease_ms as i64);
            let mut leased: Option<Task> = None;
            if let Some(mut entry) = self.cache.get_mut(&task_id) {
                if entry.status == TaskStatus::Pending {
                    entry.status = TaskStatus::Leased;
                    entry.leased_until = Some(leased_until);
                    entry.leased_by = Some(agent_id.to_string());
                    entry.attempts += 1;
                    entry.updated_at = now;
                    leased = Some(entry.clone());
                }
            }
            if let Some(task) = leased {
                self.write_through(move |conn| store::update(conn, &task)).await;
                return self.get_task(&task_id);
            }
            // Another caller won the race for this candidate; try again.
        }
    }

    /// Mark a leased task completed. Emits no event itself — callers (the
    /// swarm orchestrator) publish `task_completed` on the bus once this
    /// returns, keeping this crate free of an `osa-core` dependency.
    pub async fn complete(&self, task_id: &str, result: serde_json::Value) {
        let updated = self.cache.get_mut(task_id).map(|mut entry| {
            entry.status = TaskStatus::Completed;
            entry.result = Some(result);
            entry.leased_until = None;
            entry.leased_by = None;
            entry.completed_at = Some(Utc::now());
            entry.updated_at = Utc::now();
            entry.clone()
        });
        if let Some(task) = updated {
            self.write_through(move |conn| store::update(conn, &task)).await;
        }
    }

    /// Record a failed attempt. Terminal (`failed`) once `attempts ≥
    /// max_attempts`; otherwise reverts to `pending` for a future lease.
    pub async fn fail(&self, task_id: &str, error: String) {
        let updated = self.cache.get_mut(task_id).map(|mut entry| {
            entry.error = Some(error);
            entry.leased_until = None;
            entry.leased_by = None;
            entry.updated_at = Utc::now();
            if entry.attempts >= entry.max_attempts {
                entry.status = TaskStatus::Failed;
                entry.completed_at = Some(Utc::now());
            } else {
                entry.status = TaskStatus::Pending;
            }
            entry.clone()
        });
        if let Some(task) = updated {
            self.write_through(move |conn| store::update(conn, &task)).await;
        }
    }

    /// Revert any task whose lease has expired back to `pending`.
    /// Returns the number of tasks reaped.
    pub async fn reap_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .cache
            .iter()
            .filter(|e| e.status == TaskStatus::Leased && e.leased_until.map(|u| u < now).unwrap_or(false))
            .map(|e| e.task_id.clone())
            .collect();

        for task_id in &expired {
            let updated = self.cache.get_mut(task_id).map(|mut entry| {
                entry.status = TaskStatus::Pending;
                entry.leased_until = None;
                entry.leased_by = None;
                entry.updated_at = now;
                entry.clone()
            });
            if let Some(task) = updated {
                self.write_through(move |conn| store::update(conn, &task)).await;
            }
        }
        expired.len()
    }

    /// Spawn the 60s background reaper. Dropping the returned handle stops it.
    pub fn spawn_reaper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(REAPER_INTERVAL);
            loop {
                interval.tick().await;
                let n = queue.reap_expired().await;
                if n > 0 {
                    tracing::debug!(count = n, "reaped expired task leases");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_then_lease_returns_task() {
        let q = TaskQueue::in_memory();
        let id = q.enqueue("t1", "agent-a", serde_json::json!({"x": 1}), 3).await;
        let leased = q.lease("agent-a", 5_000).await.unwrap();
        assert_eq!(leased.task_id, id);
        assert_eq!(leased.status, TaskStatus::Leased);
        assert_eq!(leased.attempts, 1);
    }

    #[tokio::test]
    async fn lease_is_exclusive_under_concurrency() {
        let q = Arc::new(TaskQueue::in_memory());
        q.enqueue("t1", "agent-a", serde_json::json!({}), 1).await;

        let q1 = q.clone();
        let q2 = q.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { q1.lease("agent-a", 5_000).await }),
            tokio::spawn(async move { q2.lease("agent-a", 5_000).await }),
        );
        let results = [a.unwrap(), b.unwrap()];
        let successes = results.iter().filter(|r| r.is_some()).count();
        assert_eq!(successes, 1, "exactly one concurrent lease should succeed");
    }

    #[tokio::test]
    async fn fail_reverts_to_pending_until_max_attempts() {
        let q = TaskQueue::in_memory();
        let id = q.enqueue("t2", "agent-a", serde_json::json!({}), 2).await;

        q.lease("agent-a", 5_000).await.unwrap();
        q.fail(&id, "boom".into()).await;
        assert_eq!(q.get_task(&id).unwrap().status, TaskStatus::Pending);

        q.lease("agent-a", 5_000).await.unwrap();
        q.fail(&id, "boom again".into()).await;
        let task = q.get_task(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.attempts, 2);
    }

    #[tokio::test]
    async fn complete_clears_lease_and_sets_result() {
        let q = TaskQueue::in_memory();
        let id = q.enqueue("t3", "agent-a", serde_json::json!({}), 1).await;
        q.lease("agent-a", 5_000).await.unwrap();
        q.complete(&id, serde_json::json!({"ok": true})).await;
        let task = q.get_task(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.leased_by.is_none());
        assert_eq!(task.result, Some(serde_json::json!({"ok": true})));
    }

    #[tokio::test]
    async fn reap_expired_reverts_timed_out_lease() {
        let q = TaskQueue::in_memory();
        let id = q.enqueue("t4", "agent-a", serde_json::json!({}), 3).await;
        q.lease("agent-a", 1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let n = q.reap_expired().await;
        assert_eq!(n, 1);
        let task = q.get_task(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.leased_until.is_none());
    }
}
