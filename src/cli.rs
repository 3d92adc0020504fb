//! Command-line interface of deckgate, built on clap.
//!
//! [`Cli`] carries the global flags (`--config`, `--verbose`) and one
//! [`Command`]: run the gate (`serve`), follow a project (`watch`), or push
//! an update through the HTTP surface (`update`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// deckgate: project status gate for the presentation pipeline.
#[derive(Debug, Parser)]
#[command(name = "deckgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a config file (defaults to ./deckgate.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP surface.
    Serve {
        /// Listen address, overriding the config file.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Poll a project until it needs answers or is complete.
    Watch {
        project_id: String,

        /// User the project belongs to.
        #[arg(long)]
        user: String,

        /// Base URL of a running deckgate, overriding the config file.
        #[arg(long)]
        base_url: Option<String>,

        /// Seconds between status checks, overriding the config file.
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Stop after this many checks.
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Submit a status change and/or review answers for a project.
    Update {
        project_id: String,

        #[arg(long)]
        user: String,

        /// New status (must be on the server's allow-list).
        #[arg(long)]
        status: Option<String>,

        /// JSON file holding the reviewAndRefine array.
        #[arg(long)]
        answers: Option<PathBuf>,

        #[arg(long)]
        base_url: Option<String>,
    },
}
