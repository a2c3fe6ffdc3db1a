use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gate_core::{OutputFormat, RecordKind};

#[derive(Parser)]
#[command(name = "gate")]
#[command(about = "OneGate: capture, review and upload records with live sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow the record list live until interrupted
    Watch,

    /// Print the current record list
    List {
        /// Only show records of this kind
        #[arg(long, value_enum)]
        kind: Option<RecordKind>,
    },

    /// Submit new input for analysis
    Submit {
        /// Text to analyze; reads from stdin if omitted and no image is given
        text: Option<String>,

        /// Image to attach (png, jpeg, gif, webp)
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Upload analyzed records to Google Calendar or Notion
    Upload {
        /// Record ids, uploaded in order
        #[arg(required = true)]
        ids: Vec<String>,

        /// Edited analysis fields as a JSON object (single record only)
        #[arg(long)]
        final_data: Option<String>,
    },

    /// Delete records
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Edit the input text or analysis of a record
    Revise {
        id: String,

        /// Replacement input text
        #[arg(long)]
        text: Option<String>,

        /// Analysis fields to update, as a JSON object
        #[arg(long)]
        analysis: Option<String>,
    },

    /// Manage the Google Calendar credential
    Token {
        #[command(subcommand)]
        cmd: TokenCommands,
    },

    /// Show/manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },

    /// Check configuration, credentials and backend reachability
    Doctor,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Store a Google OAuth access token
    Set {
        token: String,

        /// Token lifetime in minutes from now
        #[arg(long, conflicts_with = "expires_at")]
        expires_in: Option<i64>,

        /// Absolute expiry (RFC 3339)
        #[arg(long)]
        expires_at: Option<String>,
    },

    /// Remove the stored token
    Clear,

    /// Show the stored token (masked) and its expiry
    Show,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a commented config template if none exists
    Init,
}
