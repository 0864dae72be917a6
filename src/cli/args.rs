//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for edit-server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// edit-server - Edit browser text fields in your own text editor
#[derive(Parser, Debug, Clone)]
#[command(name = "edit-server")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Settings file (default: ~/.edit-server/settings.toml)
    #[arg(short = 'c', long, global = true, env = "EDIT_SERVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Show verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Listen for edit requests from the browser extension
    Serve {
        /// Address to bind (overrides settings)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, 0 for any free port (overrides settings)
        #[arg(short = 'p', long)]
        port: Option<u16>,
    },

    /// Edit a file or stdin in the external editor
    Edit {
        /// File to edit; stdin when omitted
        file: Option<PathBuf>,

        /// Content filter: none, plain, html
        #[arg(short = 'f', long, default_value = "none")]
        filter: String,

        /// Editor command line (overrides settings and $EDIT_SERVER_EDITOR)
        #[arg(short = 'e', long)]
        editor: Option<String>,

        /// Only return when the editor exits
        #[arg(long)]
        no_incremental: bool,

        /// Write the result back to FILE instead of stdout
        #[arg(short = 'i', long, requires = "file")]
        in_place: bool,
    },

    /// Print the effective settings, or one value by dot-notation key
    Config {
        /// e.g. `editor.poll_interval_ms`
        key: Option<String>,
    },
}
