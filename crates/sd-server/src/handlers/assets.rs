//! Theme asset serving.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use sd_storage_fs::SourceError;

use crate::error::ServerError;
use crate::handlers::PageQuery;
use crate::handlers::pages::not_found;
use crate::state::AppState;

/// Handle GET /assets/{*path} from the selected theme's directory.
pub(crate) async fn asset(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ServerError> {
    let theme = state.themes.select(query.theme.as_deref());
    match state.themes.asset(&theme, &path) {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response())
        }
        Err(e) if e.is_not_found() || matches!(e, SourceError::InvalidPath { .. }) => {
            tracing::debug!(theme = %theme, path = %path, "asset not found");
            not_found(&state, &theme)
        }
        Err(e) => Err(e.into()),
    }
}
