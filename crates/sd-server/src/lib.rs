//! HTTP server for servedown.
//!
//! Serves compiled documents through themed HTML pages:
//! - `/` lists contexts, or shows search results when `q` is set
//! - `/search` shows the search form
//! - `/assets/{path}` serves files from the selected theme directory
//! - any other path shows the compiled document, redirects to its
//!   trailing-slash variant, serves the raw source file, or shows the
//!   not-found page
//!
//! Every page accepts `?theme=NAME`; `?update` reprocesses documentation
//! before answering (see the update middleware).
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sd_server::{run_server, server_config_from_config};
//!
//! let config = sd_config::Config::load(None, None)?;
//! let site = Arc::new(build_site(&config)?);
//! run_server(server_config_from_config(&config), site).await?;
//! ```

mod app;
mod error;
mod handlers;
mod middleware;
mod state;
mod templates;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use sd_config::ThemeConfig;
use sd_site::{DocumentService, Site};
use sd_storage_fs::SourceDir;

pub use error::{ServeError, ServerError};
use state::AppState;
use templates::Themes;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Unix domain socket; replaces host and port when set.
    pub socket: Option<PathBuf>,
    /// Title of pages that are not documents.
    pub default_title: String,
    /// Whether `?update` triggers reprocessing.
    pub update_query: bool,
    /// Themes and template names.
    pub theme: ThemeConfig,
}

/// Create server configuration from servedown config.
#[must_use]
pub fn server_config_from_config(config: &sd_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        socket: config.server.socket.clone(),
        default_title: config.docs_resolved.default_title.clone(),
        update_query: config.docs_resolved.update_query,
        theme: config.theme_resolved.clone(),
    }
}

/// Build the application router.
///
/// `source` is the tree raw files are served from when no compiled document
/// matches a path.
#[must_use]
pub fn create_app(config: &ServerConfig, service: Arc<dyn DocumentService>, source: SourceDir) -> Router {
    app::create_router(Arc::new(AppState {
        service,
        source,
        themes: Themes::new(&config.theme),
        default_title: config.default_title.clone(),
        update_query: config.update_query,
    }))
}

/// Run the server until Ctrl-C.
///
/// The first processing pass starts in the background once the listener is
/// bound, so requests are answered (with whatever the store already holds)
/// while documentation is still being compiled.
///
/// # Errors
///
/// Returns [`ServeError`] if the listener cannot be bound or the server loop fails.
pub async fn run_server(config: ServerConfig, site: Arc<Site>) -> Result<(), ServeError> {
    let app = create_app(
        &config,
        Arc::clone(&site) as Arc<dyn DocumentService>,
        site.source().clone(),
    );

    if let Some(socket) = &config.socket {
        return serve_unix(socket, app, site).await;
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServeError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!(address = %addr, "Starting server");

    spawn_initial_pass(site);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(unix)]
async fn serve_unix(socket: &std::path::Path, app: Router, site: Arc<Site>) -> Result<(), ServeError> {
    let bind_error = |source| ServeError::Bind {
        addr: socket.display().to_string(),
        source,
    };
    // A socket file left by a previous run blocks the bind
    if socket.exists() {
        std::fs::remove_file(socket).map_err(bind_error)?;
    }
    let listener = tokio::net::UnixListener::bind(socket).map_err(bind_error)?;
    tracing::info!(socket = %socket.display(), "Starting server");

    spawn_initial_pass(site);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(not(unix))]
async fn serve_unix(_socket: &std::path::Path, _app: Router, _site: Arc<Site>) -> Result<(), ServeError> {
    Err(ServeError::SocketUnsupported)
}

fn spawn_initial_pass(site: Arc<Site>) {
    tokio::task::spawn_blocking(move || match site.process(None) {
        Ok(summary) => tracing::info!(
            compiled = summary.compiled,
            failed = summary.failed,
            contexts = summary.contexts,
            "initial processing finished"
        ),
        Err(e) => tracing::error!(error = %e, "initial processing failed"),
    });
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
