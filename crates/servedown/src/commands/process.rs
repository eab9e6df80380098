//! `servedown process` command implementation.

use clap::Args;

use super::{SiteArgs, build_site};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the process command.
#[derive(Args)]
pub(crate) struct ProcessArgs {
    #[command(flatten)]
    pub site: SiteArgs,

    /// Restrict the pass to one context (top-level directory).
    #[arg(long)]
    context: Option<String>,
}

impl ProcessArgs {
    /// Run one processing pass and report what it did.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the pass aborts.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.site.load(&self.site.settings())?;

        output.setting("Source directory", config.docs_resolved.source_dir.display());
        if let Some(context) = &self.context {
            output.setting("Context", context);
        }
        let site = build_site(&config)?;
        let summary = site.process(self.context.as_deref())?;

        output.pass_summary(&summary);
        Ok(())
    }
}
