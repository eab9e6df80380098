//! `?update` handling.
//!
//! A request carrying `update` (empty or `true`) runs a processing pass before
//! anything else, then redirects to the same URL without the parameter. The
//! pass is restricted to the context named by the first path segment when
//! that is a known context, and covers everything otherwise.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::error::ServerError;
use crate::handlers::{first_segment, request_path};
use crate::state::AppState;

/// Name of the query parameter that triggers reprocessing.
const UPDATE_PARAM: &str = "update";

/// Middleware running a pass for `?update` requests.
pub(crate) async fn reprocess_on_update(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let query = request.uri().query().unwrap_or_default();
    if !state.update_query || !requests_update(query) {
        return next.run(request).await;
    }

    let path = request.uri().path().to_owned();
    let scope = request_path(&path)
        .as_deref()
        .and_then(first_segment)
        .filter(|segment| state.is_context(segment))
        .map(str::to_owned);
    let location = without_update(&path, query);

    tracing::info!(scope = scope.as_deref().unwrap_or("*"), "update requested");
    let service = Arc::clone(&state.service);
    let outcome = tokio::task::spawn_blocking(move || service.trigger_reprocess(scope.as_deref())).await;
    match outcome {
        Ok(Ok(summary)) => {
            tracing::debug!(compiled = summary.compiled, failed = summary.failed, "update finished");
            Redirect::to(&location).into_response()
        }
        Ok(Err(e)) => ServerError::from(e).into_response(),
        Err(e) => ServerError::from(e).into_response(),
    }
}

fn split_pair(pair: &str) -> (&str, &str) {
    pair.split_once('=').unwrap_or((pair, ""))
}

/// Whether the raw query string asks for an update.
fn requests_update(query: &str) -> bool {
    query
        .split('&')
        .map(split_pair)
        .any(|(key, value)| key == UPDATE_PARAM && (value.is_empty() || value == "true"))
}

/// `path` with the query string minus every `update` parameter.
fn without_update(path: &str, query: &str) -> String {
    let rest: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && split_pair(pair).0 != UPDATE_PARAM)
        .collect();
    if rest.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{}", rest.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_requests_update() {
        assert!(requests_update("update"));
        assert!(requests_update("update="));
        assert!(requests_update("theme=x&update=true"));
        assert!(!requests_update("update=false"));
        assert!(!requests_update("updated=true"));
        assert!(!requests_update(""));
    }

    #[test]
    fn test_without_update() {
        assert_eq!(without_update("/guide/setup", "update"), "/guide/setup");
        assert_eq!(
            without_update("/guide/setup", "theme=dark&update=true&highlight=x"),
            "/guide/setup?theme=dark&highlight=x"
        );
        assert_eq!(without_update("/", "update&&q=a"), "/?q=a");
    }
}
