//! Command-line interface definition for sqlchat
//!
//! This module defines the CLI structure using clap's derive API: the
//! interactive chat, one-shot queries, API probes and session management.

use clap::{Parser, Subcommand};

/// sqlchat - chat with a SQL-analytics API from the terminal
///
/// Ask questions in natural language; the backend plans and runs the SQL
/// and streams its progress back.
#[derive(Parser, Debug, Clone)]
#[command(name = "sqlchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the analytics API base URL
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Override the session database path
    #[arg(long, value_name = "PATH")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for sqlchat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat
    Chat {
        /// Resume a session by id or short id
        #[arg(short, long)]
        session: Option<String>,

        /// Model to use (provider:model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Ask a single question and print the reply
    Ask {
        /// The question
        query: String,

        /// Attach the question to this session (id or short id)
        #[arg(short, long)]
        session: Option<String>,

        /// Model to use (provider:model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Check whether the analytics API is reachable
    Health,

    /// List models offered by the analytics API
    Models {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage stored chat sessions
    Sessions {
        /// Session management subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List stored sessions, most recently active first
    List,

    /// Print the messages of a session
    Show {
        /// Session id or short id
        id: String,
    },

    /// Create an empty session
    New {
        /// Display name (defaults to the configured name format)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Rename a session
    Rename {
        /// Session id or short id
        id: String,
        /// New display name
        name: String,
    },

    /// Delete a session and its messages
    Delete {
        /// Session id or short id
        id: String,
    },

    /// Remove all messages of a session, keeping the session
    Clear {
        /// Session id or short id
        id: String,

        /// Also clear the backend's conversation memory
        #[arg(long)]
        remote: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
