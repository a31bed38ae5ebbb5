// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Session transcripts and keyword-indexed long-term memory (C7, spec §4.7).

mod error;
mod long_term;
mod long_term_store;
mod session_log;

pub use error::MemoryError;
pub use long_term::{extract_keywords, Entry, LongTermMemory};
pub use session_log::{default_root, HistoryEntry, SessionLog};
