//! Markdown to HTML conversion.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};

use crate::html::escape_html;

/// Rendering failure for one document.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The HTML writer failed.
    #[error("failed to write HTML: {0}")]
    Write(#[from] std::fmt::Error),
}

/// A heading encountered while rendering.
#[derive(Debug, Clone, Copy)]
pub struct Heading<'a> {
    /// Heading level (1-6).
    pub level: u8,
    /// Plain text of the heading (inline markup removed).
    pub text: &'a str,
    /// Rendered inline HTML of the heading content.
    pub html: &'a str,
}

/// Receives every heading in document order and chooses its anchor id.
pub trait HeadingInterceptor {
    /// Return the `id` attribute for `heading`.
    fn heading(&mut self, heading: &Heading<'_>) -> String;
}

/// Lightweight-markup to HTML conversion.
///
/// Implementations call `headings` once per heading, in document order, and
/// emit each heading as `<hN id="ID">inner</hN>`.
pub trait MarkupRenderer: Send + Sync {
    /// Render `text` to an HTML fragment.
    fn render(
        &self,
        text: &str,
        headings: &mut dyn HeadingInterceptor,
    ) -> Result<String, RenderError>;
}

/// CommonMark renderer built on `pulldown-cmark`.
///
/// Raw HTML in the source passes through untouched. Tables, strikethrough,
/// task lists and footnotes are enabled. Fenced code blocks are emitted as
/// `<pre><code class="lang-{info}">` so a client-side highlighter can pick
/// them up.
pub struct CommonMarkRenderer {
    options: Options,
    code_class_prefix: String,
}

impl Default for CommonMarkRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommonMarkRenderer {
    /// Create a renderer with the default extension set.
    #[must_use]
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);
        Self {
            options,
            code_class_prefix: "lang-".to_owned(),
        }
    }

    /// Use `prefix` instead of `lang-` for code block language classes.
    #[must_use]
    pub fn with_code_class_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.code_class_prefix = prefix.into();
        self
    }

    /// Rewrite heading and code block events, leaving everything else alone.
    fn intercept<'a>(
        &self,
        parser: Parser<'a>,
        headings: &mut dyn HeadingInterceptor,
    ) -> Vec<Event<'a>> {
        let mut out = Vec::new();
        let mut pending: Option<(u8, Vec<Event<'a>>)> = None;

        for event in parser {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    pending = Some((level as u8, Vec::new()));
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some((level, inner)) = pending.take() {
                        out.push(render_heading(level, inner, headings));
                    }
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    out.push(Event::Html(self.code_block_open(&kind).into()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    out.push(Event::Html(CowStr::Borrowed("</code></pre>\n")));
                }
                other => match pending.as_mut() {
                    Some((_, inner)) => inner.push(other),
                    None => out.push(other),
                },
            }
        }

        out
    }

    fn code_block_open(&self, kind: &CodeBlockKind<'_>) -> String {
        let lang = match kind {
            CodeBlockKind::Fenced(info) => info.split_whitespace().next().unwrap_or(""),
            CodeBlockKind::Indented => "",
        };
        if lang.is_empty() {
            "<pre><code>".to_owned()
        } else {
            format!(
                r#"<pre><code class="{}{}">"#,
                escape_html(&self.code_class_prefix),
                escape_html(lang)
            )
        }
    }
}

impl MarkupRenderer for CommonMarkRenderer {
    fn render(
        &self,
        text: &str,
        headings: &mut dyn HeadingInterceptor,
    ) -> Result<String, RenderError> {
        let parser = Parser::new_ext(text, self.options);
        let events = self.intercept(parser, headings);

        let mut out = String::with_capacity(text.len() + text.len() / 2);
        html::write_html_fmt(&mut out, events.into_iter())?;
        Ok(out)
    }
}

fn render_heading<'a>(
    level: u8,
    inner: Vec<Event<'a>>,
    headings: &mut dyn HeadingInterceptor,
) -> Event<'a> {
    let text = plain_text(&inner);
    let mut inner_html = String::new();
    html::push_html(&mut inner_html, inner.into_iter());

    let id = headings.heading(&Heading {
        level,
        text: &text,
        html: &inner_html,
    });
    Event::Html(
        format!(
            "<h{level} id=\"{}\">{inner_html}</h{level}>\n",
            escape_html(&id)
        )
        .into(),
    )
}

fn plain_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Records headings and numbers them.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<(u8, String, String)>,
    }

    impl HeadingInterceptor for Recorder {
        fn heading(&mut self, heading: &Heading<'_>) -> String {
            self.seen
                .push((heading.level, heading.text.to_owned(), heading.html.to_owned()));
            format!("h{}", self.seen.len())
        }
    }

    fn render(text: &str) -> (String, Recorder) {
        let mut recorder = Recorder::default();
        let html = CommonMarkRenderer::new().render(text, &mut recorder).unwrap();
        (html, recorder)
    }

    #[test]
    fn test_headings_get_interceptor_ids() {
        let (html, recorder) = render("# Title\n\n## Sub *part*\n\ntext\n");
        assert_eq!(
            html,
            "<h1 id=\"h1\">Title</h1>\n<h2 id=\"h2\">Sub <em>part</em></h2>\n<p>text</p>\n"
        );
        assert_eq!(
            recorder.seen,
            vec![
                (1, "Title".to_owned(), "Title".to_owned()),
                (2, "Sub part".to_owned(), "Sub <em>part</em>".to_owned()),
            ]
        );
    }

    #[test]
    fn test_heading_inline_code_in_text() {
        let (_, recorder) = render("## Run `make`\n");
        assert_eq!(recorder.seen[0].1, "Run make");
        assert_eq!(recorder.seen[0].2, "Run <code>make</code>");
    }

    #[test]
    fn test_interceptor_id_is_escaped() {
        struct Quote;
        impl HeadingInterceptor for Quote {
            fn heading(&mut self, _: &Heading<'_>) -> String {
                "a\"b".to_owned()
            }
        }
        let html = CommonMarkRenderer::new().render("# X\n", &mut Quote).unwrap();
        assert_eq!(html, "<h1 id=\"a&quot;b\">X</h1>\n");
    }

    #[test]
    fn test_fenced_code_block_class() {
        let (html, _) = render("```rust\nfn main() {}\n```\n");
        assert_eq!(
            html,
            "<pre><code class=\"lang-rust\">fn main() {}\n</code></pre>\n"
        );
    }

    #[test]
    fn test_code_block_escapes_content() {
        let (html, _) = render("```\n<b>&\n```\n");
        assert_eq!(html, "<pre><code>&lt;b&gt;&amp;\n</code></pre>\n");
    }

    #[test]
    fn test_custom_code_class_prefix() {
        let mut recorder = Recorder::default();
        let html = CommonMarkRenderer::new()
            .with_code_class_prefix("language-")
            .render("```js\nx\n```\n", &mut recorder)
            .unwrap();
        assert!(html.starts_with("<pre><code class=\"language-js\">"), "{html}");
    }

    #[test]
    fn test_raw_html_passes_through() {
        let (html, _) = render("<div class=\"note\">A->B</div>\n\ntext\n");
        assert_eq!(html, "<div class=\"note\">A->B</div>\n<p>text</p>\n");
    }

    #[test]
    fn test_heading_in_code_block_is_not_heading() {
        let (_, recorder) = render("```\n# not a heading\n```\n");
        assert!(recorder.seen.is_empty());
    }
}
