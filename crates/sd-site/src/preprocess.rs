//! Text rewriting applied to markdown before rendering.
//!
//! A [`PreprocessChain`] is an ordered list of [`Rule`]s. Each rule rewrites
//! every match of its pattern in the output of the previous rule. A rule
//! failure affects only the occurrence it was rewriting: that occurrence is
//! left as it was and the other matches still apply.
//!
//! The default chain has three rules, in this order:
//!
//! 1. `sequence-diagram`: `{{{{{{ style` ... `}}}}}}` blocks become a
//!    websequencediagrams.com wrapper
//! 2. `include`: `[[ include: path ]]` is replaced by the rendered HTML of
//!    another source file
//! 3. `wiki-link`: `[[ Some Title ]]` becomes `[Some Title](some-title)`

use std::fmt;

use regex::{Captures, Regex};
use sd_renderer::{escape_html, normalize_id};

/// Script loaded after each sequence diagram block.
const SEQUENCE_DIAGRAM_SCRIPT: &str =
    r#"<script src="http://www.websequencediagrams.com/service.js"></script>"#;

/// Failure of a single rule occurrence.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RuleError(pub String);

/// Compiles other source files on behalf of the `include` rule.
pub trait Includer {
    /// Render `target` as referenced from `current_file` and return its HTML.
    ///
    /// `target` is relative to the directory of `current_file`, or to the
    /// source root when it starts with `/`.
    fn include(&self, current_file: &str, target: &str) -> Result<String, String>;
}

/// Ambient data a rule transform can use.
pub struct RuleContext<'a> {
    /// Source path (relative to the root) of the file being preprocessed.
    pub current_file: &'a str,
    /// Access to recursive compilation.
    pub includer: &'a dyn Includer,
}

type Transform = Box<dyn Fn(&Captures<'_>, &RuleContext<'_>) -> Result<String, RuleError> + Send + Sync>;

/// A pattern and the function producing its replacement.
pub struct Rule {
    name: String,
    pattern: Regex,
    transform: Transform,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

impl Rule {
    /// Create a rule.
    pub fn new<F>(name: impl Into<String>, pattern: Regex, transform: F) -> Self
    where
        F: Fn(&Captures<'_>, &RuleContext<'_>) -> Result<String, RuleError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            pattern,
            transform: Box::new(transform),
        }
    }

    /// Rule name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, text: &str, ctx: &RuleContext<'_>) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures<'_>| match (self.transform)(caps, ctx) {
                Ok(replacement) => replacement,
                Err(e) => {
                    tracing::warn!(
                        rule = %self.name,
                        file = %ctx.current_file,
                        "preprocessing rule failed, keeping original text: {e}"
                    );
                    caps[0].to_owned()
                }
            })
            .into_owned()
    }
}

/// Ordered list of preprocessing rules.
#[derive(Debug, Default)]
pub struct PreprocessChain {
    rules: Vec<Rule>,
}

impl PreprocessChain {
    /// Chain with no rules (identity).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Chain with the sequence diagram, include and wiki link rules.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::empty()
            .with_rule(sequence_diagram_rule())
            .with_rule(include_rule())
            .with_rule(wiki_link_rule())
    }

    /// Append a rule to the end of the chain.
    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rule names in application order.
    #[cfg(test)]
    fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(Rule::name)
    }

    /// Run every rule over `text` in order.
    #[must_use]
    pub fn apply(&self, text: &str, ctx: &RuleContext<'_>) -> String {
        self.rules
            .iter()
            .fold(text.to_owned(), |acc, rule| rule.apply(&acc, ctx))
    }
}

fn sequence_diagram_rule() -> Rule {
    let pattern = Regex::new(r"(?s)\{{6}[ \t]*([\w-]*)[\r\n]+(.*?)\s+\}{6}").unwrap();
    Rule::new("sequence-diagram", pattern, |caps, _ctx| {
        let style = caps.get(1).map_or("", |m| m.as_str());
        let body = caps.get(2).map_or("", |m| m.as_str());
        let lines: Vec<String> = body
            .split(['\n', '\r'])
            .filter(|line| !line.is_empty())
            .map(|line| format!("\t{}", line.trim_start()))
            .collect();
        Ok([
            format!(r#"<div class="wsd" wsd_style="{}"><pre>"#, escape_html(style)),
            String::new(),
            lines.join("\n"),
            String::new(),
            format!("</pre></div>{SEQUENCE_DIAGRAM_SCRIPT}"),
        ]
        .join("\n"))
    })
}

fn include_rule() -> Rule {
    let pattern = Regex::new(r"\[\[\s*include:\s*(\S+?)\s*\]\]").unwrap();
    Rule::new("include", pattern, |caps, ctx| {
        let target = &caps[1];
        tracing::debug!(file = %ctx.current_file, include = %target, "processing include directive");
        Ok(match ctx.includer.include(ctx.current_file, target) {
            Ok(html) => html,
            Err(message) => {
                tracing::warn!(file = %ctx.current_file, include = %target, "include failed: {message}");
                format!(r#"<span class="error">{}</span>"#, escape_html(&message))
            }
        })
    })
}

fn wiki_link_rule() -> Rule {
    let pattern = Regex::new(r"\[\[\s*([^\]]*?)\s*\]\]").unwrap();
    Rule::new("wiki-link", pattern, |caps, _ctx| {
        let title = &caps[1];
        if title.is_empty() {
            return Err(RuleError("empty link title".to_owned()));
        }
        let target = normalize_id(&title.to_lowercase());
        Ok(format!("[{title}]({target})"))
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Includer serving canned HTML and recording requests.
    #[derive(Default)]
    struct FakeIncluder {
        pages: HashMap<String, String>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl Includer for FakeIncluder {
        fn include(&self, current_file: &str, target: &str) -> Result<String, String> {
            self.calls
                .borrow_mut()
                .push((current_file.to_owned(), target.to_owned()));
            self.pages
                .get(target)
                .cloned()
                .ok_or_else(|| format!("file not found: {target}"))
        }
    }

    fn apply(chain: &PreprocessChain, text: &str, includer: &FakeIncluder) -> String {
        chain.apply(
            text,
            &RuleContext {
                current_file: "guide/page.md",
                includer,
            },
        )
    }

    #[test]
    fn test_sequence_diagram_block() {
        let chain = PreprocessChain::with_defaults();
        let input = "# Title 1\n\n{{{{{{\ncontent\n}}}}}}\n\n# Title 2\n## Subtitle";
        let expected = [
            "# Title 1",
            "",
            r#"<div class="wsd" wsd_style=""><pre>"#,
            "",
            "\tcontent",
            "",
            r#"</pre></div><script src="http://www.websequencediagrams.com/service.js"></script>"#,
            "",
            "# Title 2",
            "## Subtitle",
        ]
        .join("\n");
        assert_eq!(apply(&chain, input, &FakeIncluder::default()), expected);
    }

    #[test]
    fn test_sequence_diagram_style_and_indentation() {
        let chain = PreprocessChain::with_defaults();
        let input = "{{{{{{ modern-blue\n    Alice->Bob: hi\n\n  Bob->Alice: hey\n}}}}}}";
        let output = apply(&chain, input, &FakeIncluder::default());
        assert_eq!(
            output,
            [
                r#"<div class="wsd" wsd_style="modern-blue"><pre>"#,
                "",
                "\tAlice->Bob: hi\n\tBob->Alice: hey",
                "",
                r#"</pre></div><script src="http://www.websequencediagrams.com/service.js"></script>"#,
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_two_diagram_blocks_are_independent() {
        let chain = PreprocessChain::with_defaults();
        let input = "{{{{{{\nA\n}}}}}}\ntext\n{{{{{{\nB\n}}}}}}";
        let output = apply(&chain, input, &FakeIncluder::default());
        assert_eq!(output.matches(r#"<div class="wsd""#).count(), 2);
        assert!(output.contains("\ntext\n"));
    }

    #[test]
    fn test_include_replaced_by_html() {
        let includer = FakeIncluder {
            pages: HashMap::from([("parts/intro.md".to_owned(), "<p>intro</p>\n".to_owned())]),
            ..FakeIncluder::default()
        };
        let chain = PreprocessChain::with_defaults();
        let output = apply(&chain, "Before\n\n[[ include: parts/intro.md ]]\n\nAfter", &includer);
        assert_eq!(output, "Before\n\n<p>intro</p>\n\n\nAfter");
        assert_eq!(
            includer.calls.borrow().as_slice(),
            &[("guide/page.md".to_owned(), "parts/intro.md".to_owned())]
        );
    }

    #[test]
    fn test_include_failure_is_inline_error() {
        let includer = FakeIncluder {
            pages: HashMap::from([("ok.md".to_owned(), "<p>ok</p>".to_owned())]),
            ..FakeIncluder::default()
        };
        let chain = PreprocessChain::with_defaults();
        let output = apply(&chain, "[[include:missing.md]] and [[ include: ok.md ]]", &includer);
        assert_eq!(
            output,
            r#"<span class="error">file not found: missing.md</span> and <p>ok</p>"#
        );
    }

    #[test]
    fn test_wiki_link() {
        let chain = PreprocessChain::with_defaults();
        let output = apply(
            &chain,
            "See [[ Getting Started ]] and [[Été à Paris]].",
            &FakeIncluder::default(),
        );
        assert_eq!(
            output,
            "See [Getting Started](getting-started) and [Été à Paris](ete-a-paris)."
        );
    }

    #[test]
    fn test_failed_occurrence_keeps_original_text() {
        let chain = PreprocessChain::with_defaults();
        let output = apply(&chain, "[[ ]] then [[ Next ]]", &FakeIncluder::default());
        assert_eq!(output, "[[ ]] then [Next](next)");
    }

    #[test]
    fn test_rules_apply_in_order() {
        let upper = Rule::new("upper", Regex::new("a").unwrap(), |_, _| Ok("b".to_owned()));
        let wrap = Rule::new("wrap", Regex::new("b").unwrap(), |_, _| Ok("[b]".to_owned()));
        let chain = PreprocessChain::empty().with_rule(upper).with_rule(wrap);
        assert_eq!(chain.rule_names().collect::<Vec<_>>(), vec!["upper", "wrap"]);
        assert_eq!(apply(&chain, "ab", &FakeIncluder::default()), "[b][b]");
    }

    #[test]
    fn test_no_match_is_identity() {
        let chain = PreprocessChain::with_defaults();
        let text = "# Plain\n\nNothing to rewrite here.\n";
        assert_eq!(apply(&chain, text, &FakeIncluder::default()), text);
    }

    #[test]
    fn test_default_rule_order() {
        let chain = PreprocessChain::with_defaults();
        assert_eq!(
            chain.rule_names().collect::<Vec<_>>(),
            vec!["sequence-diagram", "include", "wiki-link"]
        );
    }
}
