//! Configuration management for servedown.
//!
//! Parses `servedown.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`]. The
//! `SERVEDOWN_PORT`, `SERVEDOWN_SOCKET` and `SERVEDOWN_THEME` environment
//! variables override file values and are in turn overridden by CLI settings.
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `repos[].url`
//! - `repos[].ssh`

mod expand;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "servedown.toml";

/// Two hundred years, the lifetime of a documentation snapshot.
const DEFAULT_CACHE_TTL_SECS: u64 = 200 * 365 * 24 * 60 * 60;

const DEFAULT_EXCLUDE_DIR: &str = r"(\.git|\.gitignore|\.idea|node_modules)$";
const DEFAULT_INDEX_PATTERN: &str = "(readme|home|index)";

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Listen on a Unix domain socket instead of host and port.
    pub socket: Option<PathBuf>,
    /// Override docs source directory.
    pub source_dir: Option<PathBuf>,
    /// Override repository sync flag.
    pub sync_enabled: Option<bool>,
    /// Override cache backend.
    pub cache: Option<CacheBackend>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Documentation configuration (paths are relative strings from TOML).
    docs: DocsConfigRaw,
    /// Repository sync configuration.
    pub sync: SyncConfig,
    /// Repositories mirrored into the source directory, one per context.
    pub repos: Vec<RepoConfig>,
    /// Theme configuration (paths are relative strings from TOML).
    theme: ThemeConfigRaw,

    /// Resolved docs configuration (set after loading).
    #[serde(skip)]
    pub docs_resolved: DocsConfig,
    /// Resolved theme configuration (set after loading).
    #[serde(skip)]
    pub theme_resolved: ThemeConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Unix domain socket path. When set, host and port are ignored.
    pub socket: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            socket: None,
        }
    }
}

/// Where compiled documents are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process memory; lost on restart.
    #[default]
    Memory,
    /// One file per document under the cache directory.
    File,
}

impl std::str::FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(ConfigError::Validation(format!(
                "unknown cache backend '{other}' (expected 'memory' or 'file')"
            ))),
        }
    }
}

/// Raw docs configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocsConfigRaw {
    source_dir: Option<String>,
    cache_dir: Option<String>,
    cache: Option<CacheBackend>,
    markdown_ext: Option<Vec<String>>,
    exclude_dir: Option<String>,
    include_dir: Option<String>,
    exclude_file: Option<String>,
    index_pattern: Option<String>,
    outline_level: Option<u8>,
    default_title: Option<String>,
    update_query: Option<bool>,
    cache_ttl_secs: Option<u64>,
}

/// Resolved documentation configuration with absolute paths.
#[derive(Debug, Clone)]
pub struct DocsConfig {
    /// Root of the markdown tree; repositories are synced beneath it.
    pub source_dir: PathBuf,
    /// Directory for the file-backed cache.
    pub cache_dir: PathBuf,
    /// Cache backend.
    pub cache: CacheBackend,
    /// Extensions (without dot) of files compiled as documents.
    pub markdown_ext: Vec<String>,
    /// Pattern for directory names skipped while scanning.
    pub exclude_dir: String,
    /// Pattern a directory name must match to be scanned.
    pub include_dir: Option<String>,
    /// Pattern for markdown file names skipped while scanning.
    pub exclude_file: Option<String>,
    /// Case-insensitive pattern for file stems that collapse to their directory.
    pub index_pattern: String,
    /// Heading level collected into the outline.
    pub outline_level: u8,
    /// Title of the index page.
    pub default_title: String,
    /// Whether `?update` triggers reprocessing.
    pub update_query: bool,
    /// Lifetime of cached documents.
    pub cache_ttl: Duration,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self::with_base(Path::new("."))
    }
}

impl DocsConfig {
    fn with_base(base: &Path) -> Self {
        Self {
            source_dir: base.join("src"),
            cache_dir: base.join(".servedown").join("cache"),
            cache: CacheBackend::default(),
            markdown_ext: vec!["md".to_owned(), "markdown".to_owned()],
            exclude_dir: DEFAULT_EXCLUDE_DIR.to_owned(),
            include_dir: None,
            exclude_file: None,
            index_pattern: DEFAULT_INDEX_PATTERN.to_owned(),
            outline_level: 2,
            default_title: "Home".to_owned(),
            update_query: true,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }

    /// Pattern matching file names with one of the markdown extensions.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if an extension produces an invalid pattern.
    pub fn markdown_file_regex(&self) -> Result<Regex, ConfigError> {
        let alternatives: Vec<String> = self.markdown_ext.iter().map(|e| regex::escape(e)).collect();
        compile_pattern(&format!(r"\.({})$", alternatives.join("|")), false, "docs.markdown_ext")
    }

    /// Pattern for excluded directory names.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the pattern does not compile.
    pub fn exclude_dir_regex(&self) -> Result<Regex, ConfigError> {
        compile_pattern(&self.exclude_dir, false, "docs.exclude_dir")
    }

    /// Pattern for included directory names, if configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the pattern does not compile.
    pub fn include_dir_regex(&self) -> Result<Option<Regex>, ConfigError> {
        self.include_dir
            .as_deref()
            .map(|pattern| compile_pattern(pattern, false, "docs.include_dir"))
            .transpose()
    }

    /// Pattern for excluded file names, if configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the pattern does not compile.
    pub fn exclude_file_regex(&self) -> Result<Option<Regex>, ConfigError> {
        self.exclude_file
            .as_deref()
            .map(|pattern| compile_pattern(pattern, false, "docs.exclude_file"))
            .transpose()
    }

    /// Case-insensitive pattern for index-like file stems.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the pattern does not compile.
    pub fn index_regex(&self) -> Result<Regex, ConfigError> {
        compile_pattern(&self.index_pattern, true, "docs.index_pattern")
    }
}

/// Repository sync configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether repositories are synced before each processing pass.
    pub enabled: bool,
    /// Extra sparse-checkout patterns, added to one pattern per markdown extension.
    /// An empty list disables sparse checkout and repositories are cloned in full.
    pub include: Vec<String>,
    /// Timeout for a single git command, in seconds.
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include: vec!["assets/".to_owned()],
            timeout_secs: 300,
        }
    }
}

impl SyncConfig {
    /// Timeout for a single git command.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A repository mirrored into `{source_dir}/{name}`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RepoConfig {
    /// Context name; also the directory name under the source directory.
    pub name: String,
    /// Web URL (also used for cloning when no SSH target is set).
    pub url: Option<String>,
    /// SSH clone target.
    pub ssh: Option<String>,
    /// Branch checked out by sparse checkouts.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Source-view path appended to the base URL, with `{{file}}` and
    /// `{{fileName}}` placeholders.
    pub file_pattern: Option<String>,
}

fn default_branch() -> String {
    "master".to_owned()
}

impl RepoConfig {
    /// Address used for `git clone`: the SSH target when present.
    #[must_use]
    pub fn clone_url(&self) -> Option<&str> {
        self.ssh.as_deref().or(self.url.as_deref())
    }

    /// Address used for source links: the web URL when present.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.ssh.as_deref())
    }
}

/// Raw theme configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ThemeConfigRaw {
    default: Option<String>,
    dirs: BTreeMap<String, String>,
    templates: TemplateNames,
}

/// Template file names looked up in a theme directory.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TemplateNames {
    /// Document page.
    pub doc: String,
    /// Index page listing contexts.
    pub index: String,
    /// Empty search form.
    pub searchform: String,
    /// Search results.
    pub search: String,
}

impl Default for TemplateNames {
    fn default() -> Self {
        Self {
            doc: "doc.html".to_owned(),
            index: "index.html".to_owned(),
            searchform: "searchform.html".to_owned(),
            search: "search.html".to_owned(),
        }
    }
}

/// Resolved theme configuration.
#[derive(Debug, Clone)]
pub struct ThemeConfig {
    /// Theme used when a request does not select one.
    pub default: String,
    /// Theme name to directory holding its templates and assets.
    pub dirs: BTreeMap<String, PathBuf>,
    /// Template file names.
    pub templates: TemplateNames,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            default: "mydocs".to_owned(),
            dirs: BTreeMap::new(),
            templates: TemplateNames::default(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`repos.url`").
        field: String,
        /// Error message (e.g., "${`GIT_HOST`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn compile_pattern(pattern: &str, case_insensitive: bool, field: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| ConfigError::Validation(format!("{field} is not a valid pattern: {e}")))
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `servedown.toml` in current directory and parents.
    ///
    /// Environment overrides are applied after the file, then CLI settings,
    /// so CLI arguments take precedence over both.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }
        config.validate()?;

        Ok(config)
    }

    /// Apply `SERVEDOWN_*` overrides read through `lookup`.
    fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("SERVEDOWN_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("SERVEDOWN_PORT is not a valid port: {port}"))
            })?;
        }
        if let Some(socket) = lookup("SERVEDOWN_SOCKET").filter(|s| !s.is_empty()) {
            self.server.socket = Some(PathBuf::from(socket));
        }
        if let Some(theme) = lookup("SERVEDOWN_THEME").filter(|s| !s.is_empty()) {
            self.theme_resolved.default = theme;
        }
        Ok(())
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(socket) = &settings.socket {
            self.server.socket = Some(socket.clone());
        }
        if let Some(source_dir) = &settings.source_dir {
            self.docs_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(sync_enabled) = settings.sync_enabled {
            self.sync.enabled = sync_enabled;
        }
        if let Some(cache) = settings.cache {
            self.docs_resolved.cache = cache;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    #[must_use]
    pub fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            docs: DocsConfigRaw::default(),
            sync: SyncConfig::default(),
            repos: Vec::new(),
            theme: ThemeConfigRaw::default(),
            docs_resolved: DocsConfig::with_base(base),
            theme_resolved: ThemeConfig::default(),
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called by [`Config::load`] after all overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_docs()?;
        self.validate_repos()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.socket.is_some() {
            return Ok(());
        }
        require_non_empty(&self.server.host, "server.host")?;
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".to_owned()));
        }
        Ok(())
    }

    /// Validate docs configuration.
    fn validate_docs(&self) -> Result<(), ConfigError> {
        let docs = &self.docs_resolved;
        if docs.markdown_ext.is_empty() || docs.markdown_ext.iter().any(String::is_empty) {
            return Err(ConfigError::Validation(
                "docs.markdown_ext must list at least one non-empty extension".to_owned(),
            ));
        }
        if !(1..=6).contains(&docs.outline_level) {
            return Err(ConfigError::Validation(format!(
                "docs.outline_level must be between 1 and 6, got {}",
                docs.outline_level
            )));
        }
        docs.markdown_file_regex()?;
        docs.exclude_dir_regex()?;
        docs.include_dir_regex()?;
        docs.exclude_file_regex()?;
        docs.index_regex()?;
        Ok(())
    }

    /// Validate repository descriptors.
    fn validate_repos(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for repo in &self.repos {
            require_non_empty(&repo.name, "repos.name")?;
            if repo.name.contains(['/', '\\']) || repo.name == "." || repo.name == ".." {
                return Err(ConfigError::Validation(format!(
                    "repos.name '{}' must be a single path segment",
                    repo.name
                )));
            }
            if !seen.insert(repo.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate repository name '{}'",
                    repo.name
                )));
            }
            if repo.clone_url().is_none_or(str::is_empty) {
                return Err(ConfigError::Validation(format!(
                    "repository '{}' needs a url or ssh target",
                    repo.name
                )));
            }
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        for repo in &mut self.repos {
            if let Some(url) = &repo.url {
                repo.url = Some(expand::expand_env(url, "repos.url")?);
            }
            if let Some(ssh) = &repo.ssh {
                repo.ssh = Some(expand::expand_env(ssh, "repos.ssh")?);
            }
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));
        let defaults = DocsConfig::with_base(config_dir);
        let raw = &self.docs;

        self.docs_resolved = DocsConfig {
            source_dir: resolve(raw.source_dir.as_deref(), "src"),
            cache_dir: resolve(raw.cache_dir.as_deref(), ".servedown/cache"),
            cache: raw.cache.unwrap_or(defaults.cache),
            markdown_ext: raw.markdown_ext.clone().unwrap_or(defaults.markdown_ext),
            exclude_dir: raw.exclude_dir.clone().unwrap_or(defaults.exclude_dir),
            include_dir: raw.include_dir.clone(),
            exclude_file: raw.exclude_file.clone(),
            index_pattern: raw.index_pattern.clone().unwrap_or(defaults.index_pattern),
            outline_level: raw.outline_level.unwrap_or(defaults.outline_level),
            default_title: raw.default_title.clone().unwrap_or(defaults.default_title),
            update_query: raw.update_query.unwrap_or(defaults.update_query),
            cache_ttl: raw.cache_ttl_secs.map_or(defaults.cache_ttl, Duration::from_secs),
        };

        if let Some(socket) = &self.server.socket
            && socket.is_relative()
        {
            self.server.socket = Some(config_dir.join(socket));
        }

        self.theme_resolved = ThemeConfig {
            default: self
                .theme
                .default
                .clone()
                .unwrap_or_else(|| ThemeConfig::default().default),
            dirs: self
                .theme
                .dirs
                .iter()
                .map(|(name, dir)| (name.clone(), config_dir.join(dir)))
                .collect(),
            templates: self.theme.templates.clone(),
        };
    }
}
