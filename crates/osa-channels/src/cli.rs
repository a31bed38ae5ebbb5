// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Interactive terminal channel: prints outbound frames to stdout. Inbound
//! reading is driven by the caller (the `osa` CLI's REPL loop owns stdin),
//! so this adapter only implements the outbound half of [`Channel`].

use async_trait::async_trait;

use crate::channel::{Channel, OutboundFrame};

pub struct CliChannel;

#[async_trait]
impl Channel for CliChannel {
    fn id(&self) -> &str {
        "cli"
    }

    async fn send(&self, _session_id: &str, frame: OutboundFrame) -> anyhow::Result<()> {
        match frame {
            OutboundFrame::Text(text) => println!("{text}"),
            OutboundFrame::Event { tag, data } => {
                tracing::debug!(tag = %tag, data = %data, "cli channel event");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_text_succeeds() {
        let ch = CliChannel;
        assert!(ch.send("s1", OutboundFrame::Text("hello".into())).await.is_ok());
    }
}
