//! CLI execution runner.
//!
//! Runs one edit in the foreground, prints settings, or serves HTTP.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::filter;
use crate::session::{Checkpoint, EditorSession};
use crate::settings::{self, EditServerSettings};

use super::bootstrap::CliContext;

/// Edit `file` (or stdin) and write the result to stdout or back to `file`.
///
/// Each save is logged; the result is taken when the editor exits. A
/// failed editor keeps its temp file so no typing is lost.
pub async fn run_edit(
    ctx: &CliContext,
    file: Option<&Path>,
    filter_name: &str,
    in_place: bool,
) -> Result<()> {
    let contents = match file {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read stdin")?;
            buf
        }
    };

    let filter = filter::by_name(filter_name)?;
    let manager = ctx.session_manager.clone();
    let session = tokio::task::spawn_blocking(move || manager.open(&contents, filter)).await??;

    let ctrl_c = {
        let token = ctx.shutdown_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        })
    };
    let outcome = watch_until_exit(ctx, &session).await;
    ctrl_c.abort();
    outcome?;

    if !session.success() {
        anyhow::bail!(
            "{} (your text is still in {})",
            session.error().unwrap_or_default(),
            session.path().display()
        );
    }

    let result = session.contents()?;
    match file {
        Some(path) if in_place => tokio::fs::write(path, &result)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        _ => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&result).await?;
            stdout.flush().await?;
        }
    }

    remove_temp_file(session.path()).await;
    Ok(())
}

async fn watch_until_exit(ctx: &CliContext, session: &Arc<EditorSession>) -> Result<()> {
    loop {
        let watcher = session.clone();
        let token = ctx.shutdown_token.clone();
        let checkpoint =
            tokio::task::spawn_blocking(move || watcher.wait_for_edit_until(&token)).await??;

        match checkpoint {
            Checkpoint::Changed => {
                tracing::info!("Saved {}", session.path().display());
            }
            Checkpoint::Exited(_) => return Ok(()),
            Checkpoint::Cancelled => anyhow::bail!(
                "Editing cancelled; editor (pid {}) still has {} open",
                session.pid(),
                session.path().display()
            ),
        }
    }
}

/// Print the effective settings as TOML, or one value as JSON.
pub async fn print_config(ctx: &CliContext, key: Option<&str>) -> Result<()> {
    println!("{}", render_config(&ctx.settings, key)?.trim_end());
    Ok(())
}

/// The editor command is shown after its env and default fallbacks.
fn render_config(settings: &EditServerSettings, key: Option<&str>) -> Result<String> {
    let mut effective = settings.clone();
    effective.editor.command = Some(settings.editor.command_line());

    Ok(match key {
        Some(key) => serde_json::to_string_pretty(&settings::lookup(&effective, key)?)?,
        None => toml::to_string_pretty(&effective).context("Failed to serialize settings")?,
    })
}

/// Serve HTTP until Ctrl-C.
#[cfg(feature = "server")]
pub async fn run_server(ctx: &CliContext) -> Result<()> {
    let addr = format!("{}:{}", ctx.settings.server.host, ctx.settings.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                ctx.settings.server.host, ctx.settings.server.port
            )
        })?;

    let (addr, shutdown) = super::server::start_server(addr, ctx.session_manager.clone()).await?;
    eprintln!("edit-server listening on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    shutdown.cancel();
    Ok(())
}

#[cfg(not(feature = "server"))]
pub async fn run_server(_ctx: &CliContext) -> Result<()> {
    anyhow::bail!("edit-server was built without the `server` feature")
}

/// Delete a finished session's temp file. Failures are only logged.
pub(crate) async fn remove_temp_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::session::testing::sh_config;
    use crate::session::SessionManager;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    async fn context(script: &str, dir: &TempDir, incremental: bool) -> CliContext {
        let temp_dir = dir.path().join("edits");
        std::fs::create_dir(&temp_dir).unwrap();
        CliContext {
            settings: EditServerSettings::default(),
            session_manager: Arc::new(SessionManager::new(
                sh_config(script, &temp_dir, incremental),
                4,
            )),
            shutdown_token: CancellationToken::new(),
        }
    }

    fn leftover_edits(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("edits")).unwrap().count()
    }

    #[test]
    fn test_config_shows_effective_editor_command() {
        let settings = EditServerSettings::default();
        let expected = settings.editor.command_line();

        let value = render_config(&settings, Some("editor.command")).unwrap();
        assert_eq!(value, serde_json::to_string_pretty(&expected).unwrap());

        let all = render_config(&settings, None).unwrap();
        assert!(all.contains("command = "), "no command in:\n{}", all);
    }

    #[test]
    fn test_config_keeps_configured_command_and_rejects_unknown_keys() {
        let mut settings = EditServerSettings::default();
        settings.editor.command = Some("emacsclient -c".to_string());

        let value = render_config(&settings, Some("editor.command")).unwrap();
        assert_eq!(value, "\"emacsclient -c\"");
        assert!(render_config(&settings, Some("editor.nope")).is_err());
    }

    #[tokio::test]
    async fn test_edit_in_place() {
        let dir = TempDir::new().unwrap();
        let ctx = context(r#"printf ' world' >> "$0""#, &dir, false).await;
        let file = dir.path().join("note.txt");
        std::fs::write(&file, "hello").unwrap();

        run_edit(&ctx, Some(&file), "none", true).await.unwrap();

        assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello world");
        assert_eq!(leftover_edits(&dir), 0);
        assert_eq!(ctx.session_manager.count(), 0);
    }

    #[tokio::test]
    async fn test_edit_through_html_filter() {
        let dir = TempDir::new().unwrap();
        let ctx = context(r#"printf '\n& more' >> "$0""#, &dir, true).await;
        let file = dir.path().join("field.html");
        std::fs::write(&file, "a &lt; b").unwrap();

        run_edit(&ctx, Some(&file), "html", true).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "a &lt; b<br>&amp; more"
        );
    }

    #[tokio::test]
    async fn test_failed_editor_keeps_temp_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context("exit 3", &dir, false).await;
        let file = dir.path().join("note.txt");
        std::fs::write(&file, "keep me").unwrap();

        let err = run_edit(&ctx, Some(&file), "none", true).await.unwrap_err();

        assert!(err.to_string().contains("text editor returned 3"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "keep me");
        assert_eq!(leftover_edits(&dir), 1);
    }

    #[tokio::test]
    async fn test_unknown_filter_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = context("exit 0", &dir, false).await;
        let file = dir.path().join("note.txt");
        std::fs::write(&file, "x").unwrap();

        let err = run_edit(&ctx, Some(&file), "rot13", true).await.unwrap_err();
        assert!(err.to_string().contains("Unknown filter"));
        assert_eq!(leftover_edits(&dir), 0);
    }

    #[tokio::test]
    async fn test_cancelled_edit_reports_open_editor() {
        let dir = TempDir::new().unwrap();
        let ctx = context(crate::session::testing::WAIT_FOR_DONE, &dir, true).await;
        let file = dir.path().join("note.txt");
        std::fs::write(&file, "x").unwrap();

        let token = ctx.shutdown_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            token.cancel();
        });

        let err = run_edit(&ctx, Some(&file), "none", true).await.unwrap_err();
        assert!(err.to_string().contains("Editing cancelled"));

        for info in ctx.session_manager.list_sessions() {
            if let Some(session) = ctx.session_manager.get(&info.path) {
                crate::session::testing::release_and_wait(&session);
            }
        }
    }
}
