// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Messaging channel contract and built-in adapters (spec §1, §2: channel →
//! session lookup → ... control flow). Platform-specific wire formats are
//! out of scope; this crate defines the seam and ships the transports the
//! core itself needs (CLI, generic webhook) plus optional platform backends
//! behind feature flags.

mod channel;
mod cli;
mod registry;
mod webhook;

pub use channel::{Channel, ChannelId, InboundMessage, OutboundFrame};
pub use cli::CliChannel;
pub use registry::ChannelRegistry;
pub use webhook::WebhookChannel;
