// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Token estimator (spec §4.2): advisory token counting used to drive
//! context budgeting, never billing. Two strategies: a cheap heuristic that
//! always succeeds, and an optional JSON-RPC-over-stdio sidecar for a more
//! accurate BPE count, with a bounded timeout and LRU+TTL cache.
//!
//! Must never block the agent loop for longer than the configured timeout —
//! any sidecar failure (timeout, crash, absence) falls through to the
//! heuristic, which is pure and synchronous.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::process::Command;
use tokio::time::timeout;

/// Default timeout for a sidecar round-trip (spec §4.2: 2s).
pub const SIDECAR_TIMEOUT: Duration = Duration::from_secs(2);
/// Cache TTL for sidecar results (spec §4.2: ~5 minutes).
const CACHE_TTL: Duration = Duration::from_secs(300);
const CACHE_CAPACITY: usize = 256;

/// Heuristic token estimate: `round(words * 1.3 + non_word_non_space * 0.5)`.
///
/// Empty / whitespace-only input counts as 0 (spec §4.2).
pub fn estimate_tokens(text: &str) -> usize {
    if text.trim().is_empty() {
        return 0;
    }
    let words = text.split_whitespace().count() as f32;
    let non_word_non_space = text
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_alphanumeric())
        .count() as f32;
    (words * 1.3 + non_word_non_space * 0.5).round().max(0.0) as usize
}

struct CacheEntry {
    value: usize,
    inserted: Instant,
}

/// Small LRU cache on text-hash for sidecar results, with a TTL (spec §4.2).
pub struct TokenEstimator {
    sidecar_cmd: Option<String>,
    cache: Mutex<LruCache<u64, CacheEntry>>,
}

impl TokenEstimator {
    /// `sidecar_cmd`, when set, is spawned as `<cmd>` with the text piped on
    /// stdin and a single integer token count expected on stdout.
    pub fn new(sidecar_cmd: Option<String>) -> Self {
        Self {
            sidecar_cmd,
            cache: Mutex::new(LruCache::new(
                std::num::NonZeroUsize::new(CACHE_CAPACITY).unwrap(),
            )),
        }
    }

    pub fn heuristic_only() -> Self {
        Self::new(None)
    }

    /// Cache key: first 8 bytes of the SHA-256 digest of the raw text, as a
    /// `u64`. Text is hashed as-is — no Unicode normalization is applied (see
    /// `crate::noise::Tier2Cache` for the matching rationale).
    fn hash_key(text: &str) -> u64 {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(text.as_bytes());
        u64::from_be_bytes(digest[..8].try_into().unwrap())
    }

    /// Estimate token count, preferring the sidecar (with caching) and
    /// falling through to the heuristic on timeout, crash, or absence.
    pub async fn estimate(&self, text: &str) -> usize {
        if text.trim().is_empty() {
            return 0;
        }
        let Some(cmd) = &self.sidecar_cmd else {
            return estimate_tokens(text);
        };

        let key = Self::hash_key(text);
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.get(&key) {
                if entry.inserted.elapsed() < CACHE_TTL {
                    return entry.value;
                }
            }
        }

        match timeout(SIDECAR_TIMEOUT, run_sidecar(cmd, text)).await {
            Ok(Ok(count)) => {
                let mut cache = self.cache.lock().unwrap();
                cache.put(
                    key,
                    CacheEntry {
                        value: count,
                        inserted: Instant::now(),
                    },
                );
                count
            }
            _ => estimate_tokens(text),
        }
    }
}

async fn run_sidecar(cmd: &str, text: &str) -> anyhow::Result<usize> {
    use tokio::io::AsyncWriteExt;

    let mut child = Command::new(cmd)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await?;
    }
    let output = child.wait_with_output().await?;
    let s = String::from_utf8_lossy(&output.stdout);
    let count: usize = s.trim().parse()?;
    Ok(count)
}

/// Estimate total tokens across a batch of strings (used by the compactor
/// and context assembler to budget a whole message list at once).
pub fn estimate_tokens_batch(texts: impl IntoIterator<Item = impl AsRef<str>>) -> usize {
    texts.into_iter().map(|t| estimate_tokens(t.as_ref())).sum()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
