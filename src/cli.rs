// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

/// OSA — multi-channel, multi-provider conversational agent runtime.
#[derive(Parser, Debug)]
#[command(name = "osa", version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file (default: $OSA_HOME/config.yaml).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Write tracing output to stderr (otherwise only OSA_LOG_FILE is used).
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP/SSE surface (C17): orchestrate, classify, stream, swarm, sessions.
    Serve {
        /// Port to bind (default from config / OSA_HTTP_PORT).
        #[arg(long)]
        port: Option<u16>,
        /// Require HMAC request signing (default from config / OSA_REQUIRE_AUTH).
        #[arg(long)]
        require_auth: bool,
    },

    /// Run one message through the signal pipeline + agent loop and print the result.
    ///
    /// Equivalent to `POST /orchestrate` but invoked directly, without a server.
    Orchestrate {
        /// The message text.
        input: String,
        /// Reuse an existing session id (a new one is generated otherwise).
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Classify a message without running the agent loop.
    ///
    /// Equivalent to `POST /classify`.
    Classify {
        /// The message text.
        input: String,
    },

    /// Print the effective configuration (file + environment overlay) as YAML.
    ShowConfig,

    /// Print shell completions for the given shell.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
