//! CLI bootstrap - load settings, set up logging and the session manager.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::session::SessionManager;
use crate::settings::{EditServerSettings, SettingsManager};

use super::args::{Args, Command};

/// Context for CLI execution containing all initialized services.
pub struct CliContext {
    /// Effective settings with command-line overrides applied
    pub settings: EditServerSettings,

    /// Registry of open editor sessions
    pub session_manager: Arc<SessionManager>,

    /// Cancelled on Ctrl-C or shutdown; stops waits and the server
    pub shutdown_token: CancellationToken,
}

impl CliContext {
    /// Graceful shutdown - stop waiting on editors, report the ones left open.
    pub fn shutdown(self) {
        self.shutdown_token.cancel();

        for info in self.session_manager.list_sessions() {
            tracing::warn!(
                "Editor {} still has {} open",
                info.pid,
                info.path.display()
            );
        }
    }
}

/// Initialize the CLI context.
pub async fn initialize(args: &Args) -> Result<CliContext> {
    let settings_manager = match &args.config {
        Some(path) => SettingsManager::with_path(path.clone())
            .await
            .context("Failed to initialize settings manager")?,
        None => SettingsManager::new()
            .await
            .context("Failed to initialize settings manager")?,
    };

    let mut settings = settings_manager.get().await;
    init_logging(&settings.logging.filter, args.verbose)?;

    tracing::debug!(
        "Settings loaded from {}",
        settings_manager.path().display()
    );

    // Ensure settings file exists (creates template on first run)
    if args.config.is_none() {
        if let Err(e) = settings_manager.ensure_settings_file().await {
            tracing::warn!("Failed to create settings template: {}", e);
        }
    }

    apply_overrides(&mut settings, &args.command);

    let editor_config = settings
        .editor
        .resolve()
        .context("Invalid editor settings")?;
    tracing::debug!("Editor config: {:?}", editor_config);

    let session_manager = Arc::new(SessionManager::new(
        editor_config,
        settings.server.max_sessions,
    ));

    Ok(CliContext {
        settings,
        session_manager,
        shutdown_token: CancellationToken::new(),
    })
}

/// `RUST_LOG` wins over the settings filter; `-v` adds debug for this crate.
fn init_logging(filter: &str, verbose: bool) -> Result<()> {
    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if verbose {
        env_filter = env_filter.add_directive("edit_server=debug".parse()?);
    }

    // Logs go to stderr; stdout carries edited text
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

/// Fold command-line flags into the loaded settings.
fn apply_overrides(settings: &mut EditServerSettings, command: &Command) {
    match command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host.clone();
            }
            if let Some(port) = port {
                settings.server.port = *port;
            }
        }
        Command::Edit {
            editor,
            no_incremental,
            ..
        } => {
            if let Some(editor) = editor {
                settings.editor.command = Some(editor.clone());
            }
            if *no_incremental {
                settings.editor.incremental = false;
            }
        }
        Command::Config { .. } => {}
    }
}
