// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Generic outbound webhook delivery: POSTs frames as JSON to a configured
//! URL. Used both as a channel adapter and by the scheduler's trigger
//! mechanism (spec §4.16) to deliver job output to an external endpoint.

use async_trait::async_trait;
use serde_json::json;

use crate::channel::{Channel, OutboundFrame};

pub struct WebhookChannel {
    id: String,
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, session_id: &str, frame: OutboundFrame) -> anyhow::Result<()> {
        let body = match frame {
            OutboundFrame::Text(text) => json!({ "session_id": session_id, "text": text }),
            OutboundFrame::Event { tag, data } => {
                json!({ "session_id": session_id, "event": tag, "data": data })
            }
        };
        let resp = self.client.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("webhook {} returned {}", self.url, resp.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_channel_reports_its_id() {
        let ch = WebhookChannel::new("wh1", "https://example.invalid/hook");
        assert_eq!(ch.id(), "wh1");
    }
}
