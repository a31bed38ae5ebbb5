// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Heartbeat checklist (spec §4.16, §6): a human-editable markdown file of
//! `- [ ] ...` / `- [x] ... (done <timestamp>)` lines, scanned on an
//! interval. Unchecked items are dispatched as agent messages, then marked
//! checked with the completion timestamp.

use chrono::Utc;

/// One line parsed out of the checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    pub done: bool,
    pub text: String,
}

/// Parse a `HEARTBEAT.md` checklist. Non-checklist lines are ignored.
pub fn parse_checklist(content: &str) -> Vec<ChecklistItem> {
    content
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("- [ ] ") {
                Some(ChecklistItem { done: false, text: rest.trim().to_string() })
            } else if let Some(rest) = trimmed.strip_prefix("- [x] ") {
                Some(ChecklistItem { done: true, text: rest.trim().to_string() })
            } else {
                None
            }
        })
        .collect()
}

/// Rewrite `content`, marking the first unchecked line whose text equals
/// `text` as done with `timestamp` appended. No-op if not found (the file
/// may have been edited concurrently).
pub fn mark_done(content: &str, text: &str, timestamp: &str) -> String {
    let mut marked = false;
    content
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if !marked {
                if let Some(rest) = trimmed.strip_prefix("- [ ] ") {
                    if rest.trim() == text {
                        marked = true;
                        let indent = &line[..line.len() - trimmed.len()];
                        return format!("{indent}- [x] {text} (done {timestamp})");
                    }
                }
            }
            line.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read the checklist at `path`, mark every unchecked item done with the
/// current timestamp, and return those items for the caller to dispatch as
/// agent messages. Marking happens before dispatch so a stalled or crashed
/// dispatch can never cause the same item to repeat on the next scan.
pub async fn scan_and_mark(path: &str) -> anyhow::Result<Vec<ChecklistItem>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let items = parse_checklist(&content);
    let pending: Vec<ChecklistItem> = items.into_iter().filter(|i| !i.done).collect();
    if pending.is_empty() {
        return Ok(pending);
    }

    let mut updated = content;
    let timestamp = Utc::now().to_rfc3339();
    for item in &pending {
        updated = mark_done(&updated, &item.text, &timestamp);
    }
    tokio::fs::write(path, updated).await?;

    Ok(pending)
}
