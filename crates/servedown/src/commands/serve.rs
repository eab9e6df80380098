//! `servedown serve` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use sd_config::CacheBackend;
use sd_server::{run_server, server_config_from_config};

use super::{SiteArgs, build_site};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Unix domain socket to listen on instead of host and port.
    #[arg(long)]
    socket: Option<PathBuf>,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let mut settings = self.site.settings();
        settings.host = self.host;
        settings.port = self.port;
        settings.socket = self.socket;
        let config = self.site.load(&settings)?;

        match &config.server.socket {
            Some(socket) => output.setting("Listening on", socket.display()),
            None => output.setting(
                "Listening on",
                format!("{}:{}", config.server.host, config.server.port),
            ),
        }
        output.setting("Source directory", config.docs_resolved.source_dir.display());
        match config.docs_resolved.cache {
            CacheBackend::Memory => output.setting("Cache", "memory"),
            CacheBackend::File => output.setting("Cache directory", config.docs_resolved.cache_dir.display()),
        }
        if config.sync.enabled {
            output.setting("Repository sync", format!("{} repositories", config.repos.len()));
        } else {
            output.setting("Repository sync", "disabled");
        }

        let site = Arc::new(build_site(&config)?);
        run_server(server_config_from_config(&config), site).await?;
        Ok(())
    }
}
