//! CLI command implementations.

pub(crate) mod process;
pub(crate) mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use sd_cache::{DocumentStore, FileStore, MemoryStore};
use sd_config::{CacheBackend, CliSettings, Config};
use sd_site::{Site, SiteConfig, git_sync};

pub(crate) use process::ProcessArgs;
pub(crate) use serve::ServeArgs;

use crate::error::CliError;

/// Options shared by every command that processes documentation.
#[derive(Args)]
pub(crate) struct SiteArgs {
    /// Path to configuration file (default: auto-discover servedown.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Documentation source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Skip repository synchronization.
    #[arg(long)]
    no_sync: bool,

    /// Cache backend: `memory` or `file` (overrides config).
    #[arg(long)]
    cache: Option<CacheBackend>,

    /// Enable verbose output (processing and request logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl SiteArgs {
    /// CLI settings from these options; server fields are left unset.
    pub(crate) fn settings(&self) -> CliSettings {
        CliSettings {
            source_dir: self.source_dir.clone(),
            sync_enabled: self.no_sync.then_some(false),
            cache: self.cache,
            ..CliSettings::default()
        }
    }

    /// Load configuration with `settings` applied on top of the file.
    pub(crate) fn load(&self, settings: &CliSettings) -> Result<Config, CliError> {
        Ok(Config::load(self.config.as_deref(), Some(settings))?)
    }
}

/// Open the document store selected by the configuration.
pub(crate) fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>, CliError> {
    let docs = &config.docs_resolved;
    let store: Arc<dyn DocumentStore> = match docs.cache {
        CacheBackend::Memory => Arc::new(MemoryStore::new(docs.cache_ttl)),
        CacheBackend::File => Arc::new(FileStore::open(
            docs.cache_dir.clone(),
            crate::VERSION,
            docs.cache_ttl,
        )?),
    };
    Ok(store)
}

/// Build the site for `config`.
pub(crate) fn build_site(config: &Config) -> Result<Site, CliError> {
    let site_config = SiteConfig::from_config(config)?;
    let store = open_store(config)?;
    Ok(Site::new(site_config, store, Arc::new(git_sync(config))))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use sd_cache::DocumentStoreExt;
    use sd_site::CompiledDocument;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_settings_from_flags() {
        let args = SiteArgs {
            config: None,
            source_dir: Some(PathBuf::from("/docs")),
            no_sync: true,
            cache: Some(CacheBackend::File),
            verbose: false,
        };
        let settings = args.settings();
        assert_eq!(settings.source_dir, Some(PathBuf::from("/docs")));
        assert_eq!(settings.sync_enabled, Some(false));
        assert_eq!(settings.cache, Some(CacheBackend::File));
        assert_eq!(settings.host, None);

        let args = SiteArgs { no_sync: false, ..args };
        assert_eq!(args.settings().sync_enabled, None);
    }

    #[test]
    fn test_file_store_survives_rebuild() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src/guide")).unwrap();
        fs::write(tmp.path().join("src/guide/setup.md"), "# Setup\n").unwrap();

        let mut config = Config::default_with_base(tmp.path());
        config.docs_resolved.cache = CacheBackend::File;
        config.sync.enabled = false;

        let site = build_site(&config).unwrap();
        site.process(None).unwrap();

        let store = open_store(&config).unwrap();
        let doc: Option<CompiledDocument> = store.get_json("/guide/setup").unwrap();
        assert_eq!(doc.unwrap().canonical_path, "guide/setup");
    }
}
