//! Markdown rendering for servedown.
//!
//! This crate turns one markdown document into an HTML fragment while letting
//! the caller choose every heading's anchor id through a [`HeadingInterceptor`].
//! [`OutlineCollector`] is the interceptor used for documents: it assigns
//! [`normalize_id`] slugs and records the outline.
//!
//! # Example
//!
//! ```
//! use sd_renderer::{CommonMarkRenderer, MarkupRenderer, OutlineCollector};
//!
//! let mut outline = OutlineCollector::new(2);
//! let html = CommonMarkRenderer::new()
//!     .render("# Guide\n\n## Getting started\n", &mut outline)
//!     .unwrap();
//!
//! assert!(html.contains(r#"<h2 id="getting-started">"#));
//! assert_eq!(outline.into_entries()[0].title, "Getting started");
//! ```

mod html;
mod normalize;
mod outline;
mod renderer;

pub use html::{escape_html, strip_tags};
pub use normalize::normalize_id;
pub use outline::{OutlineCollector, OutlineEntry};
pub use renderer::{CommonMarkRenderer, Heading, HeadingInterceptor, MarkupRenderer, RenderError};
