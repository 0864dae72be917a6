//! edit-server - edit browser text fields in your own text editor
//!
//! # Usage
//!
//! ```bash
//! # Serve the browser extension on 127.0.0.1:9292
//! edit-server serve
//!
//! # Edit a file in place, HTML-aware
//! edit-server edit --filter html --in-place field.html
//!
//! # Pipe text through the editor
//! echo "draft" | edit-server edit --editor "vim" > final.txt
//! ```

use anyhow::Result;
use clap::Parser;

use edit_server::cli::{initialize, print_config, run_edit, run_server, Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let ctx = initialize(&args).await?;

    let result = match &args.command {
        Command::Serve { .. } => run_server(&ctx).await,
        Command::Edit {
            file,
            filter,
            in_place,
            ..
        } => run_edit(&ctx, file.as_deref(), filter, *in_place).await,
        Command::Config { key } => print_config(&ctx, key.as_deref()).await,
    };

    // Graceful shutdown
    ctx.shutdown();

    result
}
