//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;

use sd_site::DocumentService;
use sd_storage_fs::SourceDir;

use crate::templates::Themes;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Compiled documents, contexts, search and reprocessing.
    pub(crate) service: Arc<dyn DocumentService>,
    /// Source tree for raw-file fallback.
    pub(crate) source: SourceDir,
    /// Themes and templates.
    pub(crate) themes: Themes,
    /// Title of pages that are not documents.
    pub(crate) default_title: String,
    /// Whether `?update` triggers reprocessing.
    pub(crate) update_query: bool,
}

impl AppState {
    /// Whether `name` is a known context.
    pub(crate) fn is_context(&self, name: &str) -> bool {
        self.service.list_contexts().iter().any(|c| c == name)
    }
}
