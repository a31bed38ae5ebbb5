// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Ties the three scheduling mechanisms (spec §4.16) to one circuit-breaker
//! table and one dispatch surface.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use osa_config::SchedulerConfig;
use tracing::{error, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::cron_job::{due, load_cron_jobs, parse_schedule};
use crate::heartbeat::scan_and_mark;
use crate::job::{interpolate_template, AgentSink, JobAction};
use crate::shell_job::run_shell_job;
use crate::trigger::{interpolate_action, load_triggers};

pub struct Scheduler {
    config: Arc<SchedulerConfig>,
    sink: Arc<dyn AgentSink>,
    http: reqwest::Client,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl Scheduler {
    pub fn new(config: Arc<SchedulerConfig>, sink: Arc<dyn AgentSink>) -> Arc<Self> {
        Arc::new(Self {
            config,
            sink,
            http: reqwest::Client::new(),
            breakers: DashMap::new(),
        })
    }

    fn breaker(&self, job_id: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.circuit_breaker_threshold)))
            .clone()
    }

    /// Explicit re-enable of a tripped job (spec §4.16).
    pub fn reenable(&self, job_id: &str) {
        self.breaker(job_id).reset();
    }

    pub fn is_disabled(&self, job_id: &str) -> bool {
        self.breaker(job_id).is_open()
    }

    /// Run one job action, honoring its circuit breaker. Returns the
    /// produced text (agent reply, shell output, or webhook status).
    async fn run_action(&self, job_id: &str, action: &JobAction) -> Result<String, String> {
        let breaker = self.breaker(job_id);
        if breaker.is_open() {
            return Err(format!("job {job_id} is disabled by its circuit breaker"));
        }

        let result = match action {
            JobAction::AgentMessage { text } => {
                self.sink.dispatch(text).await.map_err(|e| e.to_string())
            }
            JobAction::Shell { command } => {
                let out = run_shell_job(
                    command,
                    self.config.shell_job_timeout_secs,
                    self.config.shell_job_output_cap,
                )
                .await;
                if out.is_error {
                    Err(out.content)
                } else {
                    Ok(out.content)
                }
            }
            JobAction::Webhook { url, body } => self
                .http
                .post(url)
                .json(body)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map(|r| format!("webhook delivered: {}", r.status()))
                .map_err(|e| e.to_string()),
        };

        match &result {
            Ok(_) => breaker.record_success(),
            Err(e) => {
                let tripped = breaker.record_failure();
                if tripped {
                    error!(job_id, error = %e, "job circuit breaker tripped after consecutive failures");
                } else {
                    warn!(job_id, error = %e, "scheduled job failed");
                }
            }
        }
        result
    }

    /// Scan the heartbeat checklist once and dispatch every unchecked item.
    pub async fn run_heartbeat_once(&self) {
        match scan_and_mark(&self.config.heartbeat_file).await {
            Ok(items) => {
                for item in items {
                    let job_id = format!("heartbeat:{}", item.text);
                    let action = JobAction::AgentMessage { text: item.text.clone() };
                    if let Err(e) = self.run_action(&job_id, &action).await {
                        warn!(item = %item.text, error = %e, "heartbeat item dispatch failed");
                    }
                }
            }
            Err(e) => error!(error = %e, "failed to scan heartbeat checklist"),
        }
    }

    /// Check every cron job against `now` and fire the ones that are due.
    pub async fn run_cron_tick(&self, now: chrono::DateTime<chrono::Utc>) {
        let jobs = match load_cron_jobs(&self.config.crons_file).await {
            Ok(j) => j,
            Err(e) => {
                error!(error = %e, "failed to load cron jobs");
                return;
            }
        };
        for job in jobs {
            if !job.enabled || self.is_disabled(&job.id) {
                continue;
            }
            let schedule = match parse_schedule(&job.expression) {
                Ok(s) => s,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "skipping cron job with invalid expression");
                    continue;
                }
            };
            if due(&schedule, now) {
                info!(job_id = %job.id, "cron job is due, firing");
                if let Err(e) = self.run_action(&job.id, &job.action).await {
                    warn!(job_id = %job.id, error = %e, "cron job failed");
                }
            }
        }
    }

    /// Fire the trigger `trigger_id`, interpolating its action template with
    /// `vars` (spec §4.16 triggers, fired via an inbound HTTP endpoint).
    pub async fn fire_trigger(&self, trigger_id: &str, vars: HashMap<String, String>) -> anyhow::Result<String> {
        let triggers = load_triggers(&self.config.triggers_file).await?;
        let trigger = triggers
            .into_iter()
            .find(|t| t.id == trigger_id)
            .ok_or_else(|| anyhow::anyhow!("unknown trigger '{trigger_id}'"))?;
        if !trigger.enabled || self.is_disabled(&trigger.id) {
            anyhow::bail!("trigger '{trigger_id}' is disabled");
        }
        let action = interpolate_action(&trigger.action, &vars);
        self.run_action(&trigger.id, &action).await.map_err(|e| anyhow::anyhow!(e))
    }

    /// Spawn the background loop that scans the heartbeat checklist every
    /// `heartbeat_interval_secs`.
    pub fn spawn_heartbeat_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(this.config.heartbeat_interval_secs));
            loop {
                interval.tick().await;
                this.run_heartbeat_once().await;
            }
        })
    }

    /// Spawn the background loop that ticks cron jobs once a minute.
    pub fn spawn_cron_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                this.run_cron_tick(chrono::Utc::now()).await;
            }
        })
    }
}

/// Exercised by `interpolate_template` re-export so callers building a
/// webhook body from trigger vars don't need a second import path.
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> String {
    interpolate_template(template, vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::NullAgentSink;

    fn config() -> Arc<SchedulerConfig> {
        Arc::new(SchedulerConfig {
            heartbeat_file: "/tmp/osa-sched-test-heartbeat-nonexistent.md".to_string(),
            crons_file: "/tmp/osa-sched-test-crons-nonexistent.json".to_string(),
            triggers_file: "/tmp/osa-sched-test-triggers-nonexistent.json".to_string(),
            heartbeat_interval_secs: 1800,
            circuit_breaker_threshold: 2,
            shell_job_timeout_secs: 5,
            shell_job_output_cap: 1024,
        })
    }

    #[tokio::test]
    async fn run_action_dispatches_agent_message() {
        let scheduler = Scheduler::new(config(), Arc::new(NullAgentSink));
        let result = scheduler
            .run_action("job1", &JobAction::AgentMessage { text: "hi".to_string() })
            .await
            .unwrap();
        assert!(result.contains("hi"));
    }

    #[tokio::test]
    async fn breaker_trips_after_threshold_failures() {
        let scheduler = Scheduler::new(config(), Arc::new(NullAgentSink));
        let bad = JobAction::Shell { command: "rm -rf /tmp/x".to_string() };
        assert!(scheduler.run_action("job2", &bad).await.is_err());
        assert!(scheduler.run_action("job2", &bad).await.is_err());
        assert!(scheduler.is_disabled("job2"));
        // Third call is rejected outright by the open breaker.
        let err = scheduler.run_action("job2", &bad).await.unwrap_err();
        assert!(err.contains("disabled"));
    }

    #[tokio::test]
    async fn reenable_clears_breaker() {
        let scheduler = Scheduler::new(config(), Arc::new(NullAgentSink));
        let bad = JobAction::Shell { command: "rm -rf /tmp/x".to_string() };
        let _ = scheduler.run_action("job3", &bad).await;
        let _ = scheduler.run_action("job3", &bad).await;
        assert!(scheduler.is_disabled("job3"));
        scheduler.reenable("job3");
        assert!(!scheduler.is_disabled("job3"));
    }

    #[tokio::test]
    async fn unknown_trigger_errors() {
        let scheduler = Scheduler::new(config(), Arc::new(NullAgentSink));
        let result = scheduler.fire_trigger("nope", HashMap::new()).await;
        assert!(result.is_err());
    }
}
