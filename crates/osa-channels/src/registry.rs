// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Content-addressable channel registry, mirroring `osa_tools::ToolRegistry`
//! and `osa_model::ProviderRegistry`: lock-free snapshot reads, atomic
//! registration.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::channel::Channel;

type ChannelMap = HashMap<String, Arc<dyn Channel>>;

pub struct ChannelRegistry {
    channels: ArcSwap<ChannelMap>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self { channels: ArcSwap::from_pointee(HashMap::new()) }
    }

    pub fn register(&self, channel: Arc<dyn Channel>) {
        let id = channel.id().to_string();
        self.channels.rcu(|map| {
            let mut next = (**map).clone();
            next.insert(id.clone(), channel.clone());
            next
        });
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Channel>> {
        self.channels.load().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.channels.load().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::OutboundFrame;
    use async_trait::async_trait;

    struct Stub(&'static str);

    #[async_trait]
    impl Channel for Stub {
        fn id(&self) -> &str {
            self.0
        }
        async fn send(&self, _session_id: &str, _frame: OutboundFrame) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn register_and_get() {
        let reg = ChannelRegistry::new();
        reg.register(Arc::new(Stub("cli")));
        assert!(reg.get("cli").is_some());
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn ids_are_sorted() {
        let reg = ChannelRegistry::new();
        reg.register(Arc::new(Stub("webhook")));
        reg.register(Arc::new(Stub("cli")));
        assert_eq!(reg.ids(), vec!["cli".to_string(), "webhook".to_string()]);
    }
}
