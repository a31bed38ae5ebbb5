// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Session registry (spec §4.11): maps `session_id -> loop process`.
//!
//! Each session owns exactly one [`Agent`], driven by a single `tokio::task`
//! reading commands off an `mpsc` channel — "one process per `session_id`"
//! realized as one task per key rather than an OS process or actor. Creation
//! is double-checked under a per-id lock so a concurrent first-message burst
//! for the same new `session_id` can only ever spawn one loop (spec §9: the
//! "new-session creation crashing under concurrent load" race is the
//! invariant this closes).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

use crate::agent::Agent;
use crate::events::AgentEvent;

/// Outcome of a `process_message` call through the registry.
#[derive(Debug)]
pub enum LoopReply {
    /// The turn completed (or was cancelled); events were streamed on the
    /// caller-provided sender.
    Done,
    /// The loop was mid-turn; the caller should queue and retry (spec §4.10:
    /// "returning `busy` otherwise (callers queue)").
    Busy,
}

enum LoopCommand {
    Process {
        text: String,
        events: mpsc::Sender<AgentEvent>,
        reply: oneshot::Sender<anyhow::Result<()>>,
    },
    Cancel {
        reply: oneshot::Sender<()>,
    },
}

/// A live session's addressable handle.
struct SessionHandle {
    tx: mpsc::Sender<LoopCommand>,
    /// Set while a turn is in flight; `process_message` checks-and-sets this
    /// atomically so a second inbound message while busy is rejected
    /// immediately rather than queued internally.
    busy: Arc<AtomicBool>,
    cancel_tx: Arc<AsyncMutex<Option<oneshot::Sender<()>>>>,
}

/// Maps `session_id -> loop process` (spec §4.11).
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
    /// Per-`session_id` creation locks, taken before the double-checked
    /// lookup in [`ensure_loop`].
    creation_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            creation_locks: DashMap::new(),
        })
    }

    /// Create the loop for `session_id` if absent, then return. Race-free
    /// under concurrent first-message bursts: the per-id creation lock is
    /// held across the double-checked lookup, so only one caller ever
    /// spawns the task for a given id (spec §9, §4.11).
    pub async fn ensure_loop(self: &Arc<Self>, session_id: &str, agent: Agent) {
        if self.sessions.contains_key(session_id) {
            return;
        }
        let lock = self
            .creation_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;
        // Double-checked: another caller may have created it while we waited.
        if self.sessions.contains_key(session_id) {
            return;
        }
        let handle = spawn_loop(agent);
        self.sessions.insert(session_id.to_string(), handle);
    }

    /// Returns `true` if a loop exists for `session_id`.
    pub fn whereis(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// All currently registered session ids.
    pub fn list(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Explicit termination: drops the handle, which closes the command
    /// channel and lets the owning task exit on its next `recv()`.
    pub fn terminate(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Send a message into the session's loop. Returns `Busy` without
    /// touching the loop if a turn is already in flight (spec §4.10).
    pub async fn process_message(
        &self,
        session_id: &str,
        text: String,
        events: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<LoopReply> {
        let handle = match self.sessions.get(session_id) {
            Some(h) => h,
            None => anyhow::bail!("no loop registered for session {session_id}"),
        };

        if handle
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(LoopReply::Busy);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let send_result = handle
            .tx
            .send(LoopCommand::Process {
                text,
                events,
                reply: reply_tx,
            })
            .await;

        if send_result.is_err() {
            handle.busy.store(false, Ordering::SeqCst);
            anyhow::bail!("session loop for {session_id} has shut down");
        }

        match reply_rx.await {
            Ok(result) => {
                handle.busy.store(false, Ordering::SeqCst);
                result?;
                Ok(LoopReply::Done)
            }
            Err(_) => {
                handle.busy.store(false, Ordering::SeqCst);
                anyhow::bail!("session loop for {session_id} dropped the reply channel");
            }
        }
    }

    /// Cancel the in-flight turn for `session_id`, if any (spec §5
    /// `cancel(session_id)`).
    pub async fn cancel(&self, session_id: &str) {
        let Some(handle) = self.sessions.get(session_id) else {
            return;
        };
        let mut guard = handle.cancel_tx.lock().await;
        if let Some(tx) = guard.take() {
            let _ = tx.send(());
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
            creation_locks: DashMap::new(),
        }
    }
}

/// Spawn the owning task for one session's agent loop.
fn spawn_loop(mut agent: Agent) -> SessionHandle {
    let (tx, mut rx) = mpsc::channel::<LoopCommand>(8);
    let busy = Arc::new(AtomicBool::new(false));
    let cancel_tx: Arc<AsyncMutex<Option<oneshot::Sender<()>>>> = Arc::new(AsyncMutex::new(None));
    let cancel_tx_task = cancel_tx.clone();

    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                LoopCommand::Process { text, events, reply } => {
                    let (c_tx, c_rx) = oneshot::channel();
                    *cancel_tx_task.lock().await = Some(c_tx);
                    let result = agent.submit_with_cancel(&text, events, c_rx).await;
                    *cancel_tx_task.lock().await = None;
                    let _ = reply.send(result);
                }
                LoopCommand::Cancel { reply } => {
                    if let Some(c_tx) = cancel_tx_task.lock().await.take() {
                        let _ = c_tx.send(());
                    }
                    let _ = reply.send(());
                }
            }
        }
    });

    SessionHandle { tx, busy, cancel_tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osa_config::AgentMode;
    use osa_model::MockProvider;
    use osa_tools::{events::ToolEvent, ToolRegistry};
    use std::sync::Arc as StdArc;
    use tokio::sync::Mutex;

    fn mock_agent() -> Agent {
        let model: StdArc<dyn osa_model::ModelProvider> = StdArc::new(MockProvider);
        let tools = StdArc::new(ToolRegistry::default());
        let config = StdArc::new(osa_config::AgentConfig::default());
        let mode_lock = StdArc::new(Mutex::new(AgentMode::Agent));
        let (_tx, tool_event_rx) = mpsc::channel::<ToolEvent>(8);
        Agent::new(
            model,
            tools,
            config,
            crate::runtime_context::AgentRuntimeContext::default(),
            mode_lock,
            tool_event_rx,
            128_000,
        )
    }

    #[tokio::test]
    async fn ensure_loop_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.ensure_loop("s1", mock_agent()).await;
        assert!(registry.whereis("s1"));
        // Calling again with a fresh agent must not create a second loop.
        registry.ensure_loop("s1", mock_agent()).await;
        assert_eq!(registry.list().len(), 1);
    }

    #[tokio::test]
    async fn process_message_runs_and_reports_done() {
        let registry = SessionRegistry::new();
        registry.ensure_loop("s1", mock_agent()).await;
        let (tx, _rx) = mpsc::channel(32);
        let reply = registry
            .process_message("s1", "hello".into(), tx)
            .await
            .unwrap();
        assert!(matches!(reply, LoopReply::Done));
    }

    #[tokio::test]
    async fn unknown_session_errors() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(32);
        let result = registry.process_message("nope", "hi".into(), tx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn terminate_removes_session() {
        let registry = SessionRegistry::new();
        registry.ensure_loop("s1", mock_agent()).await;
        assert!(registry.terminate("s1"));
        assert!(!registry.whereis("s1"));
    }
}
