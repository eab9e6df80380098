//! Error types for the HTTP server.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use sd_cache::CacheError;
use sd_renderer::escape_html;
use sd_site::ProcessError;
use sd_storage_fs::SourceError;

use crate::templates;

/// Error raised while handling a request.
///
/// Rendered as the generic error page with status 500. The page shows a short
/// description only; details go to the log.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The document store failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A reprocessing pass requested with `?update` failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// A template failed to compile or render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// A raw file exists but could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// Message shown to the client.
    fn public_message(&self) -> &'static str {
        match self {
            Self::Cache(_) => "the document store is unavailable",
            Self::Process(ProcessError::Sync(_)) => "repository synchronization failed",
            Self::Process(_) => "documentation processing failed",
            Self::Template(_) => "the page template could not be rendered",
            Self::Source(_) => "the file could not be read",
            Self::Task(_) => "internal error",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        let body = format!(
            "<h3>Ooops… an error occurred</h3><p>{}</p>",
            escape_html(self.public_message())
        );
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(templates::builtin_page("Error", &body)),
        )
            .into_response()
    }
}

/// Error starting the server.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The listener could not be bound.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        /// TCP address or socket path.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Unix domain sockets are not available on this platform.
    #[error("unix domain sockets are not supported on this platform")]
    SocketUnsupported,

    /// The server loop failed.
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}
