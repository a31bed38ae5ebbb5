// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Cron jobs (spec §4.16, §6 `CRONS.json`): 5-field expressions ticked once
//! a minute.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};

use crate::job::JobAction;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    /// 5-field cron expression: `minute hour day-of-month month day-of-week`.
    pub expression: String,
    pub action: JobAction,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Load the cron job list from `path`. A missing file means "no cron jobs
/// configured" rather than an error.
pub async fn load_cron_jobs(path: &str) -> anyhow::Result<Vec<CronJob>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Parse a 5-field cron expression into a [`cron::Schedule`]. The `cron`
/// crate requires a leading seconds field, so a `0 ` is prepended — the
/// scheduler only ever fires on whole-minute boundaries (spec §4.16's
/// "1-minute tick"), so seconds are always zero.
pub fn parse_schedule(expression: &str) -> anyhow::Result<Schedule> {
    let with_seconds = format!("0 {expression}");
    Schedule::from_str(&with_seconds).map_err(|e| anyhow::anyhow!("invalid cron expression '{expression}': {e}"))
}

/// `true` if `schedule` has a scheduled fire time in the one-minute window
/// ending at `now` (exclusive of the start, inclusive of `now`) — i.e. "is
/// this the minute to fire" when called once per minute.
pub fn due(schedule: &Schedule, now: DateTime<Utc>) -> bool {
    match schedule.after(&(now - Duration::minutes(1))).next() {
        Some(next) => next <= now,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_minute_is_always_due() {
        let s = parse_schedule("* * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 30, 12, 0, 0).unwrap();
        assert!(due(&s, now));
    }

    #[test]
    fn specific_minute_is_not_due_off_schedule() {
        let s = parse_schedule("0 0 * * *").unwrap();
        let not_midnight = Utc.with_ymd_and_hms(2026, 7, 30, 12, 30, 0).unwrap();
        assert!(!due(&s, not_midnight));
        let midnight = Utc.with_ymd_and_hms(2026, 7, 30, 0, 0, 0).unwrap();
        assert!(due(&s, midnight));
    }

    #[tokio::test]
    async fn missing_file_is_empty_list() {
        let jobs = load_cron_jobs("/tmp/osa-crons-does-not-exist.json").await.unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn loads_jobs_from_json() {
        let path = std::env::temp_dir().join(format!("osa-crons-test-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &path,
            r#"[{"id":"j1","expression":"* * * * *","action":{"type":"agent_message","text":"ping"},"enabled":true}]"#,
        )
        .await
        .unwrap();
        let jobs = load_cron_jobs(path.to_str().unwrap()).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "j1");
        tokio::fs::remove_file(&path).await.ok();
    }
}
