//! Command-line front end for edit-server.
//!
//! ```text
//! +-------------+     +---------------+     +------------------+
//! | args.rs     | --> | bootstrap.rs  | --> | runner.rs        |
//! | (clap)      |     | (settings,    |     | (edit / config / |
//! |             |     |  logging)     |     |  serve)          |
//! +-------------+     +---------------+     +------------------+
//!                                                   |
//!                                                   v
//!                                           server/ (axum, feature
//!                                           `server`)
//! ```

mod args;
mod bootstrap;
mod runner;
#[cfg(feature = "server")]
pub mod server;

pub use args::{Args, Command};
pub use bootstrap::{initialize, CliContext};
pub use runner::{print_config, run_edit, run_server};
