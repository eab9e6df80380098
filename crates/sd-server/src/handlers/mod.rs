//! HTTP request handlers.

pub(crate) mod assets;
pub(crate) mod pages;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Deserialize;

/// Characters kept as-is in link paths.
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Query parameters understood by page handlers.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    /// Theme for this request.
    pub(crate) theme: Option<String>,
    /// Search query.
    pub(crate) q: Option<String>,
    /// Text to highlight in a document.
    pub(crate) highlight: Option<String>,
}

impl PageQuery {
    /// Non-blank search query.
    pub(crate) fn search(&self) -> Option<&str> {
        self.q.as_deref().filter(|q| !q.trim().is_empty())
    }
}

/// Decoded request path without the leading slash.
pub(crate) fn request_path(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|path| path.trim_start_matches('/').to_owned())
}

/// First non-empty segment of a path.
pub(crate) fn first_segment(path: &str) -> Option<&str> {
    path.split('/').find(|s| !s.is_empty())
}

/// Percent-encode a path for use in a link.
pub(crate) fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SAFE).to_string()
}

/// Percent-encode a query value (like `encodeURIComponent`).
pub(crate) fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}
