//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::get;
use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{assets, pages};
use crate::middleware::{security, update};
use crate::state::AppState;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/search", get(pages::search_form))
        .route("/assets/{*path}", get(assets::asset))
        .fallback(pages::document)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            update::reprocess_on_update,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(security::content_type_options_layer())
                .layer(security::frame_options_layer()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use regex::{Regex, RegexBuilder};
    use sd_cache::MemoryStore;
    use sd_config::ThemeConfig;
    use sd_site::{DocumentService, Site, SiteConfig};
    use sd_storage_fs::SourceDir;
    use sd_vcs::GitSync;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::templates::Themes;

    struct Fixture {
        _tmp: TempDir,
        src: std::path::PathBuf,
        theme_dir: std::path::PathBuf,
        site: Arc<Site>,
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let theme_dir = tmp.path().join("theme");
        write(&src, "guide/readme.md", "# Guide\n\nWelcome to the guide.\n");
        write(&src, "guide/setup.md", "# Setup\n\n## Install\n\nRun the installer.\n");
        write(&src, "guide/notes.txt", "plain notes");
        write(&src, "user-manual/index.md", "# Manual\n");
        write(&theme_dir, "css/main.css", "body { margin: 0 }");

        let config = SiteConfig {
            source_dir: src.clone(),
            markdown_file: Regex::new(r"\.(md|markdown)$").unwrap(),
            exclude_dir: Regex::new(r"\.git$").unwrap(),
            include_dir: None,
            exclude_file: None,
            index_pattern: RegexBuilder::new("(readme|home|index)")
                .case_insensitive(true)
                .build()
                .unwrap(),
            outline_level: 2,
            repos: Vec::new(),
            sync_enabled: false,
        };
        let store = Arc::new(MemoryStore::new(Duration::from_secs(3600)));
        let sync = Arc::new(GitSync::new(src.clone(), Duration::from_secs(5)));
        let site = Arc::new(Site::new(config, store, sync));
        site.process(None).unwrap();

        Fixture {
            _tmp: tmp,
            src,
            theme_dir,
            site,
        }
    }

    fn router(fixture: &Fixture, update_query: bool) -> Router {
        let theme = ThemeConfig {
            dirs: [("mydocs".to_owned(), fixture.theme_dir.clone())].into_iter().collect(),
            ..ThemeConfig::default()
        };
        let service = Arc::clone(&fixture.site) as Arc<dyn DocumentService>;
        create_router(Arc::new(AppState {
            service,
            source: SourceDir::new(fixture.src.clone()),
            themes: Themes::new(&theme),
            default_title: "Home".to_owned(),
            update_query,
        }))
    }

    async fn get(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_index_lists_contexts() {
        let fixture = fixture();
        let response = get(router(&fixture, true), "/").await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("<title>Home</title>"));
        assert!(html.contains("<h1>Welcome :-)</h1>"));
        assert!(html.contains(r#"<a title="Guide" href="guide/">Guide</a>"#));
        assert!(html.contains(r#"<a title="User manual" href="user-manual/">User manual</a>"#));
    }

    #[tokio::test]
    async fn test_document_page() {
        let fixture = fixture();
        let response = get(router(&fixture, true), "/guide/setup").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::ETAG));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");

        let html = body_text(response).await;
        assert!(html.contains("<title>guide</title>"));
        assert!(html.contains(r#"<h2 id="install">Install</h2>"#));
        assert!(html.contains(r##"<nav class="toc"><ul><li><a href="#install">Install</a></li></ul></nav>"##));
        assert!(html.contains(r#"<a href="/guide/">guide</a> / <a href="/guide/setup">setup</a>"#));
    }

    #[tokio::test]
    async fn test_document_etag_not_modified() {
        let fixture = fixture();
        let first = get(router(&fixture, true), "/guide/setup").await;
        let etag = first.headers()[header::ETAG].clone();

        let response = router(&fixture, true)
            .oneshot(
                Request::builder()
                    .uri("/guide/setup")
                    .header(header::IF_NONE_MATCH, etag)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_directory_index_redirects_to_trailing_slash() {
        let fixture = fixture();
        let response = get(router(&fixture, true), "/guide").await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/guide/");

        let response = get(router(&fixture, true), "/guide/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Welcome to the guide."));
    }

    #[tokio::test]
    async fn test_highlight() {
        let fixture = fixture();
        let response = get(router(&fixture, true), "/guide/setup?highlight=install").await;
        let html = body_text(response).await;
        assert!(
            html.contains(r#"<h2 id="install"><span class="highlight">Install</span></h2>"#),
            "{html}"
        );
        assert!(html.contains(r#"Run the <span class="highlight">install</span>er."#));
    }

    #[tokio::test]
    async fn test_search_results() {
        let fixture = fixture();
        let response = get(router(&fixture, true), "/?q=install").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(r#"href="/guide/setup?highlight=install""#), "{html}");
        assert!(!html.contains(r#"href="/guide/?highlight"#));

        let response = get(router(&fixture, true), "/guide/setup?q=nothing+like+this").await;
        assert!(body_text(response).await.contains("no content matches your query"));
    }

    #[tokio::test]
    async fn test_search_form() {
        let fixture = fixture();
        let response = get(router(&fixture, true), "/search").await;
        let html = body_text(response).await;
        assert!(html.contains("<title>Search</title>"));
        assert!(html.contains(r#"<input type="text" name="q""#));
    }

    #[tokio::test]
    async fn test_raw_file_fallback() {
        let fixture = fixture();
        let response = get(router(&fixture, true), "/guide/notes.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(body_text(response).await, "plain notes");
    }

    #[tokio::test]
    async fn test_not_found() {
        let fixture = fixture();
        let response = get(router(&fixture, true), "/guide/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Ooops… resource not found"));

        let response = get(router(&fixture, true), "/%2e%2e/%2e%2e/etc/passwd").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_theme_assets() {
        let fixture = fixture();
        let response = get(router(&fixture, true), "/assets/css/main.css").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");

        let response = get(router(&fixture, true), "/assets/css/main.css?theme=other").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_reprocesses_and_redirects() {
        let fixture = fixture();
        write(&fixture.src, "guide/faq.md", "# FAQ\n");
        write(&fixture.src, "user-manual/extra.md", "# Extra\n");

        let response = get(router(&fixture, true), "/guide/setup?theme=mydocs&update").await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/guide/setup?theme=mydocs");

        // Only the guide context was reprocessed
        let response = get(router(&fixture, true), "/guide/faq").await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = get(router(&fixture, true), "/user-manual/extra").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Outside a known context everything is reprocessed
        let response = get(router(&fixture, true), "/?update=true").await;
        assert_eq!(location(&response), "/");
        let response = get(router(&fixture, true), "/user-manual/extra").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_disabled() {
        let fixture = fixture();
        write(&fixture.src, "guide/faq.md", "# FAQ\n");

        let response = get(router(&fixture, false), "/guide/setup?update").await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = get(router(&fixture, false), "/guide/faq").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
