//! Raw-text search and result highlighting.
//!
//! Queries are case-insensitive regular expressions. A query that is not a
//! valid expression is searched for literally. Matches that fall inside an
//! HTML tag (between `<` and `>`) are ignored, so attribute values and tag
//! names never count as hits and are never highlighted.

use regex::{Regex, RegexBuilder};

/// A document matching a search query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    /// Canonical path of the document.
    pub canonical_path: String,
    /// Byte offset of the first match in the raw text.
    pub position: usize,
}

/// Compiled search query.
#[derive(Clone, Debug)]
pub struct SearchQuery {
    pattern: Regex,
}

impl SearchQuery {
    /// Compile `query`. Returns `None` for a blank query.
    #[must_use]
    pub fn new(query: &str) -> Option<Self> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let pattern = build(query).or_else(|_| build(&regex::escape(query))).ok()?;
        Some(Self { pattern })
    }

    /// Byte offset of the first match outside a tag.
    #[must_use]
    pub fn find_in(&self, text: &str) -> Option<usize> {
        let mut tags = TagState::default();
        self.pattern
            .find_iter(text)
            .filter(|m| !m.is_empty())
            .find(|m| !tags.inside_at(text, m.start()))
            .map(|m| m.start())
    }

    /// Wrap every match outside a tag in `<span class="highlight">`.
    #[must_use]
    pub fn highlight(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut last = 0;
        let mut tags = TagState::default();
        for m in self.pattern.find_iter(html) {
            if m.is_empty() || tags.inside_at(html, m.start()) {
                continue;
            }
            out.push_str(&html[last..m.start()]);
            out.push_str(r#"<span class="highlight">"#);
            out.push_str(m.as_str());
            out.push_str("</span>");
            last = m.end();
        }
        out.push_str(&html[last..]);
        out
    }
}

fn build(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Forward scan tracking whether the cursor is between a `<` and its `>`.
///
/// Queries must come in non-decreasing offset order; each byte of the text
/// is looked at once across all queries.
#[derive(Default)]
struct TagState {
    scanned: usize,
    inside: bool,
}

impl TagState {
    /// Whether byte offset `pos` lies inside a tag.
    fn inside_at(&mut self, text: &str, pos: usize) -> bool {
        if pos > self.scanned {
            for byte in &text.as_bytes()[self.scanned..pos] {
                match byte {
                    b'<' => self.inside = true,
                    b'>' => self.inside = false,
                    _ => {}
                }
            }
            self.scanned = pos;
        }
        self.inside
    }
}

/// Highlight `query` in `html`. A blank query leaves the HTML unchanged.
#[must_use]
pub fn highlight(html: &str, query: &str) -> String {
    match SearchQuery::new(query) {
        Some(query) => query.highlight(html),
        None => html.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_blank_query() {
        assert!(SearchQuery::new("").is_none());
        assert!(SearchQuery::new("   ").is_none());
    }

    #[test]
    fn test_case_insensitive_find() {
        let query = SearchQuery::new("install").unwrap();
        assert_eq!(query.find_in("How to INSTALL things"), Some(7));
        assert_eq!(query.find_in("nothing here"), None);
    }

    #[test]
    fn test_regex_query() {
        let query = SearchQuery::new("colou?r").unwrap();
        assert_eq!(query.find_in("the color red"), Some(4));
        assert_eq!(query.find_in("the colour red"), Some(4));
    }

    #[test]
    fn test_invalid_regex_is_literal() {
        let query = SearchQuery::new("a(b").unwrap();
        assert_eq!(query.find_in("xx a(b yy"), Some(3));
        assert_eq!(query.find_in("ab"), None);
    }

    #[test]
    fn test_match_inside_tag_is_skipped() {
        let query = SearchQuery::new("class").unwrap();
        assert_eq!(query.find_in(r#"<div class="x">no hit</div>"#), None);
        assert_eq!(query.find_in(r#"<div class="x">first class</div>"#), Some(21));
    }

    #[test]
    fn test_highlight_outside_tags() {
        let html = r#"<a href="/setup" title="Setup">Setup guide</a> and setup notes"#;
        assert_eq!(
            highlight(html, "setup"),
            r#"<a href="/setup" title="Setup"><span class="highlight">Setup</span> guide</a> and <span class="highlight">setup</span> notes"#
        );
    }

    #[test]
    fn test_highlight_blank_query_is_identity() {
        let html = "<p>text</p>";
        assert_eq!(highlight(html, ""), html);
    }

    #[test]
    fn test_highlight_after_unclosed_angle_bracket() {
        // A stray `<` in text hides later matches until the next `>`
        let html = "a < b match";
        assert_eq!(highlight(html, "match"), "a < b match");
    }

    #[test]
    fn test_many_matches_next_to_markup() {
        let unit = r#"<b title="x">x</b> x "#;
        let html = unit.repeat(20_000);
        let highlighted = highlight(&html, "x");

        assert_eq!(highlighted.matches(r#"<span class="highlight">x</span>"#).count(), 40_000);
        assert_eq!(highlighted.matches(r#"title="x""#).count(), 20_000);

        let query = SearchQuery::new("x").unwrap();
        assert_eq!(query.find_in(&html), Some(13));
    }

    #[test]
    fn test_tag_state_tracks_nested_positions() {
        let text = "a <b> c <d";
        let mut tags = TagState::default();
        assert!(!tags.inside_at(text, 0));
        assert!(tags.inside_at(text, 3));
        assert!(!tags.inside_at(text, 6));
        assert!(!tags.inside_at(text, 6));
        assert!(tags.inside_at(text, 9));
    }
}
