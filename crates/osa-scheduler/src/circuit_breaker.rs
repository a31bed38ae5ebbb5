// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-job circuit breaker (spec §4.16): three consecutive failures disable
//! a job until an explicit re-enable.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Tracks consecutive failures for one scheduled job and trips once a
/// configured threshold is reached.
pub struct CircuitBreaker {
    threshold: u32,
    consecutive_failures: AtomicU32,
    open: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: AtomicU32::new(0),
            open: AtomicBool::new(false),
        }
    }

    /// `true` if the job is currently disabled and must not run.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Record a successful run, resetting the failure count.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    /// Record a failed run. Opens the breaker once `threshold` consecutive
    /// failures have been seen. Returns `true` if this failure tripped it.
    pub fn record_failure(&self) -> bool {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.threshold {
            self.open.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Explicit re-enable (spec §4.16: "disable it until explicit
    /// re-enable"). Clears the failure count too.
    pub fn reset(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }
}
