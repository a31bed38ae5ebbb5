// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Vetted shell execution for scheduled jobs (spec §4.16): a 30-second
//! wall-clock timeout, a 100 KB output cap, and the shared blocklist in
//! `osa_core::shell_guard` — run before every spawn, not just once at
//! registration, since a cron/trigger job's command text can itself be
//! template-interpolated at fire time.

use std::process::Stdio;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use osa_core::shell_guard::vet_shell_command;
use tokio::process::Command;

pub struct ShellJobOutput {
    pub content: String,
    pub is_error: bool,
}

/// Vet then run `command`, capping combined stdout+stderr at `output_cap`
/// bytes and enforcing `timeout_secs` wall-clock.
pub async fn run_shell_job(command: &str, timeout_secs: u64, output_cap: usize) -> ShellJobOutput {
    if let Err(reason) = vet_shell_command(command) {
        return ShellJobOutput { content: reason, is_error: true };
    }

    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(command);
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    match tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await {
        Ok(Ok(output)) => {
            let mut content = String::new();
            content.push_str(&String::from_utf8_lossy(&output.stdout));
            if !output.stderr.is_empty() {
                content.push_str("\n[stderr]\n");
                content.push_str(&String::from_utf8_lossy(&output.stderr));
            }
            if content.len() > output_cap {
                content.truncate(output_cap);
                content.push_str("\n...[output capped]...");
            }
            ShellJobOutput { content, is_error: !output.status.success() }
        }
        Ok(Err(e)) => ShellJobOutput { content: format!("spawn error: {e}"), is_error: true },
        Err(_) => ShellJobOutput { content: format!("timeout after {timeout_secs}s"), is_error: true },
    }
}
