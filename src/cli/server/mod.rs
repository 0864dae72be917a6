//! HTTP server for browser edit requests.
//!
//! # Architecture
//!
//! ```text
//! +------------------------------------------+
//! |  Axum HTTP Server                        |
//! |  /status (GET)    -> liveness banner     |
//! |  /sessions (GET)  -> list sessions       |
//! |  /edit (POST)     -> open/resume + wait  |
//! +------------------------------------------+
//!          |
//!          v
//! +------------------------------------------+
//! |  SessionManager (path -> EditorSession)  |
//! |    +-- chrome_xxxx.txt: gvim (pid 1234)  |
//! |    +-- ... (max configurable sessions)   |
//! +------------------------------------------+
//! ```
//!
//! Waits run on the blocking pool. Each one listens on a child of the
//! server's shutdown token.
//!
//! # Feature Flag
//!
//! This module is only available when the `server` feature is enabled.

mod handlers;
pub mod types;

pub use handlers::AppState;
pub use types::{ErrorResponse, ListSessionsResponse};

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::session::SessionManager;

/// Start the HTTP server.
///
/// Returns the bound address (useful with port 0) and a token that shuts the
/// server down when cancelled.
///
/// ```ignore
/// let (addr, shutdown) = start_server("127.0.0.1:9292".parse()?, manager).await?;
/// println!("Server listening on {}", addr);
///
/// // Later, to shut down:
/// shutdown.cancel();
/// ```
pub async fn start_server(
    addr: SocketAddr,
    session_manager: Arc<SessionManager>,
) -> anyhow::Result<(SocketAddr, CancellationToken)> {
    let (state, shutdown_token) = AppState::new(session_manager);

    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("HTTP server listening on {}", actual_addr);

    // Run server with graceful shutdown
    let server_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(server_shutdown.cancelled_owned())
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_token))
}

/// Create the router with all routes configured.
///
/// This is separated from `start_server` to enable easier testing.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(handlers::status))
        .route("/sessions", get(handlers::list_sessions))
        .route("/edit", post(handlers::edit))
        .with_state(state)
}
