//! HTML page handlers: index, search, documents and the not-found page.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use md5::{Digest, Md5};
use minijinja::context;
use sd_renderer::OutlineEntry;
use sd_site::{CompiledDocument, RepoAttribution, highlight};
use sd_storage_fs::SourceError;
use serde::Serialize;

use crate::error::ServerError;
use crate::handlers::{PageQuery, encode_component, encode_path, first_segment, request_path};
use crate::state::AppState;
use crate::templates::Template;

/// Context entry on the index page.
#[derive(Serialize)]
struct Folder {
    name: String,
    title: String,
}

impl Folder {
    /// Title is the name with non-word characters as spaces, first letter upper-cased.
    fn new(name: &str) -> Self {
        let spaced: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
            .collect();
        let mut chars = spaced.chars();
        let title = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Self {
            name: name.to_owned(),
            title,
        }
    }
}

/// Search result link.
#[derive(Serialize)]
struct SearchLink {
    href: String,
    path: String,
}

/// Breadcrumb item of a document page.
#[derive(Serialize)]
struct Crumb {
    title: String,
    href: String,
}

/// Data handed to the layout for a document.
#[derive(Serialize)]
struct DocumentPage<'a> {
    title: &'a str,
    body: &'a str,
    toc: &'a [OutlineEntry],
    repo: Option<&'a RepoAttribution>,
    breadcrumb: Vec<Crumb>,
}

/// Handle GET / (search results when `q` is set).
pub(crate) async fn home(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ServerError> {
    let theme = state.themes.select(query.theme.as_deref());
    if let Some(q) = query.search() {
        return search(&state, &theme, q);
    }

    let folders: Vec<Folder> = state
        .service
        .list_contexts()
        .iter()
        .map(|name| Folder::new(name))
        .collect();
    let body = state
        .themes
        .render(&theme, Template::Index, context! { folders })?;
    let html = state.themes.page(&theme, &state.default_title, &body)?;
    Ok(Html(html).into_response())
}

/// Handle GET /search (the search form).
pub(crate) async fn search_form(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ServerError> {
    let theme = state.themes.select(query.theme.as_deref());
    let body = state.themes.render(&theme, Template::SearchForm, context! {})?;
    let html = state.themes.page(&theme, "Search", &body)?;
    Ok(Html(html).into_response())
}

/// Handle any other path: search, document, trailing-slash redirect, raw
/// file or not found, in that order.
pub(crate) async fn document(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let theme = state.themes.select(query.theme.as_deref());
    if let Some(q) = query.search() {
        return search(&state, &theme, q);
    }
    let Some(path) = request_path(uri.path()) else {
        return not_found(&state, &theme);
    };

    if let Some(doc) = state.service.lookup_document(&path)? {
        return render_document(&state, &theme, &doc, query.highlight.as_deref(), &headers);
    }

    if !path.is_empty()
        && !path.ends_with('/')
        && state.service.lookup_document(&format!("{path}/"))?.is_some()
    {
        return Ok(Redirect::to(&format!("{}/", uri.path())).into_response());
    }

    match state.source.read_raw(&path) {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response())
        }
        Err(e) if e.is_not_found() || matches!(e, SourceError::InvalidPath { .. }) => {
            not_found(&state, &theme)
        }
        Err(e) => Err(e.into()),
    }
}

fn render_document(
    state: &AppState,
    theme: &str,
    doc: &CompiledDocument,
    highlight_query: Option<&str>,
    headers: &HeaderMap,
) -> Result<Response, ServerError> {
    let body = match highlight_query {
        Some(q) => highlight(&doc.html, q),
        None => doc.html.clone(),
    };
    let title = first_segment(&doc.canonical_path).unwrap_or(state.default_title.as_str());
    let page = DocumentPage {
        title,
        body: &body,
        toc: &doc.outline,
        repo: doc.repo.as_ref(),
        breadcrumb: breadcrumb(&doc.canonical_path),
    };
    let html = state.themes.render(
        theme,
        Template::Doc,
        minijinja::Value::from_serialize(&page),
    )?;

    let etag = compute_etag(&html);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && if_none_match.as_bytes() == etag.as_bytes()
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    Ok((
        [
            (header::ETAG, etag),
            (header::CACHE_CONTROL, "no-cache".to_owned()),
        ],
        Html(html),
    )
        .into_response())
}

fn search(state: &AppState, theme: &str, q: &str) -> Result<Response, ServerError> {
    let docs: Vec<SearchLink> = state
        .service
        .search_raw_text(q)?
        .into_iter()
        .map(|hit| {
            let path = format!("/{}", hit.canonical_path);
            SearchLink {
                href: encode_path(&path),
                path,
            }
        })
        .collect();
    let body = state.themes.render(
        theme,
        Template::Search,
        context! { q, encoded_q => encode_component(q), docs },
    )?;
    let html = state.themes.page(theme, &state.default_title, &body)?;
    Ok(Html(html).into_response())
}

/// The themed not-found page.
pub(crate) fn not_found(state: &AppState, theme: &str) -> Result<Response, ServerError> {
    let html = state.themes.page(
        theme,
        &state.default_title,
        "<h3>Ooops… resource not found</h3>",
    )?;
    Ok((StatusCode::NOT_FOUND, Html(html)).into_response())
}

/// One crumb per path segment; directories link with a trailing slash.
fn breadcrumb(canonical_path: &str) -> Vec<Crumb> {
    let segments: Vec<&str> = canonical_path.split('/').filter(|s| !s.is_empty()).collect();
    let is_dir = canonical_path.ends_with('/');
    let mut href = String::from("/");
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            href.push_str(segment);
            if i + 1 < segments.len() || is_dir {
                href.push('/');
            }
            Crumb {
                title: (*segment).to_owned(),
                href: encode_path(&href),
            }
        })
        .collect()
}

/// Compute `ETag` from page content.
fn compute_etag(html: &str) -> String {
    let hash = Md5::digest(html.as_bytes());
    format!("\"{}\"", &hex::encode(hash)[..16])
}
