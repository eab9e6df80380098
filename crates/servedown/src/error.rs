//! CLI error types.

use sd_cache::CacheError;
use sd_config::ConfigError;
use sd_server::ServeError;
use sd_site::ProcessError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("cache: {0}")]
    Cache(#[from] CacheError),

    #[error("{0}")]
    Process(#[from] ProcessError),

    #[error("{0}")]
    Serve(#[from] ServeError),
}
