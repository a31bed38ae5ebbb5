// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The channel contract (spec §1, §2): the core only needs a channel to
//! hand it inbound text tagged with a stable channel id, and to accept
//! outbound text/event frames back. Wire formats for specific platforms
//! (Telegram, Slack, Discord, …) are plug-in endpoints outside this crate's
//! required surface — this module defines the seam they implement against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Stable identifier for a channel instance (spec §3 `Signal.channel`).
/// Free-form by design — `format_for_channel` in `osa-core` maps known
/// prefixes/names to a `Format`; unrecognised ids fall back to `Message`.
pub type ChannelId = String;

/// One inbound message handed to the core by a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: ChannelId,
    pub session_id: String,
    pub user_id: Option<String>,
    pub text: String,
}

/// One outbound frame a channel adapter must be able to deliver: either the
/// agent's final text for a turn, or a lower-level event it chooses to
/// surface to its own users (typing indicators, tool progress, etc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutboundFrame {
    Text(String),
    Event { tag: String, data: serde_json::Value },
}

/// A channel adapter: receives inbound text from its transport and can
/// deliver outbound frames back to the same transport. Implementations own
/// their own wire format entirely; this crate only standardizes the
/// boundary the agent runtime calls through.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable id used as `Signal.channel` and in session/channel bookkeeping.
    fn id(&self) -> &str;

    /// Deliver one outbound frame for `session_id` back through this
    /// channel's transport.
    async fn send(&self, session_id: &str, frame: OutboundFrame) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullChannel;

    #[async_trait]
    impl Channel for NullChannel {
        fn id(&self) -> &str {
            "null"
        }
        async fn send(&self, _session_id: &str, _frame: OutboundFrame) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn null_channel_accepts_any_frame() {
        let ch = NullChannel;
        assert!(ch.send("s1", OutboundFrame::Text("hi".into())).await.is_ok());
    }
}
