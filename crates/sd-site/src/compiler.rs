//! Source file to [`CompiledDocument`] conversion.

use std::cell::RefCell;
use std::sync::Arc;

use regex::Regex;
use sd_config::RepoConfig;
use sd_renderer::{CommonMarkRenderer, MarkupRenderer, OutlineCollector, OutlineEntry, RenderError};
use sd_storage_fs::{SourceDir, SourceError, resolve_relative};

use crate::document::{CompiledDocument, RepoAttribution, canonical_path, context_of};
use crate::preprocess::{Includer, PreprocessChain, RuleContext};

/// Deepest chain of nested includes followed before giving up.
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Error compiling one document.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The source file is missing or unreadable.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The markdown renderer failed.
    #[error("failed to render {path}: {source}")]
    Render {
        /// Source path.
        path: String,
        /// Renderer failure.
        #[source]
        source: RenderError,
    },
    /// A file includes itself, directly or through other files.
    #[error("include cycle: {}", chain.join(" -> "))]
    IncludeCycle {
        /// Include chain ending with the repeated file.
        chain: Vec<String>,
    },
    /// Includes are nested deeper than [`MAX_INCLUDE_DEPTH`].
    #[error("includes nested deeper than {limit} levels at {path}")]
    IncludeDepth {
        /// File whose include was refused.
        path: String,
        /// Depth limit.
        limit: usize,
    },
}

impl CompileError {
    /// Whether the source file does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Source(e) if e.is_not_found())
    }
}

/// Rendered body of a single file.
struct Rendered {
    raw: String,
    html: String,
    outline: Vec<OutlineEntry>,
}

/// Turns source files into [`CompiledDocument`]s.
///
/// Each file goes through the preprocessing chain, then the markup renderer
/// with a fresh [`OutlineCollector`]. Includes found by the chain recurse into
/// the same steps for the included file, so nested documents never share
/// outline state with the document including them.
pub struct Compiler {
    source: SourceDir,
    renderer: Arc<dyn MarkupRenderer>,
    chain: PreprocessChain,
    index_pattern: Regex,
    outline_level: u8,
    repos: Vec<RepoConfig>,
}

impl Compiler {
    /// Create a compiler reading from `source`.
    ///
    /// Uses the CommonMark renderer, the default preprocessing chain and an
    /// outline of second-level headings.
    #[must_use]
    pub fn new(source: SourceDir, index_pattern: Regex) -> Self {
        Self {
            source,
            renderer: Arc::new(CommonMarkRenderer::new()),
            chain: PreprocessChain::with_defaults(),
            index_pattern,
            outline_level: 2,
            repos: Vec::new(),
        }
    }

    /// Use a different preprocessing chain.
    #[must_use]
    pub fn with_chain(mut self, chain: PreprocessChain) -> Self {
        self.chain = chain;
        self
    }

    /// Collect headings of `level` into the outline.
    #[must_use]
    pub fn with_outline_level(mut self, level: u8) -> Self {
        self.outline_level = level;
        self
    }

    /// Repositories used for source attribution.
    #[must_use]
    pub fn with_repos(mut self, repos: Vec<RepoConfig>) -> Self {
        self.repos = repos;
        self
    }

    /// Canonical request path for a source file.
    #[must_use]
    pub fn canonical_path(&self, file: &str) -> String {
        canonical_path(file, &self.index_pattern)
    }

    /// Compile one source file.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Source`] if the file is missing or unreadable
    /// and [`CompileError::Render`] if rendering fails. Include failures do
    /// not fail the document; they are rendered inline as errors.
    pub fn compile(&self, file: &str) -> Result<CompiledDocument, CompileError> {
        let file = file.trim_start_matches('/');
        let session = IncludeSession {
            compiler: self,
            stack: RefCell::new(vec![file.to_owned()]),
        };
        let rendered = self.render_file(file, &session)?;

        let repo = context_of(file)
            .and_then(|context| self.repos.iter().find(|r| r.name == context))
            .map(|repo| RepoAttribution::for_file(repo, file));

        Ok(CompiledDocument {
            canonical_path: self.canonical_path(file),
            source_path: file.to_owned(),
            html: rendered.html,
            raw: rendered.raw,
            outline: rendered.outline,
            repo,
        })
    }

    fn render_file(&self, file: &str, session: &IncludeSession<'_>) -> Result<Rendered, CompileError> {
        let raw = self.source.read_to_string(file)?;
        let text = self.chain.apply(
            &raw,
            &RuleContext {
                current_file: file,
                includer: session,
            },
        );

        let mut outline = OutlineCollector::new(self.outline_level);
        let html = self
            .renderer
            .render(&text, &mut outline)
            .map_err(|source| CompileError::Render {
                path: file.to_owned(),
                source,
            })?;

        Ok(Rendered {
            raw,
            html,
            outline: outline.into_entries(),
        })
    }
}

/// Include state of one top-level compilation.
struct IncludeSession<'a> {
    compiler: &'a Compiler,
    /// Files currently being compiled, outermost first.
    stack: RefCell<Vec<String>>,
}

impl IncludeSession<'_> {
    fn include_file(&self, current_file: &str, target: &str) -> Result<String, CompileError> {
        let path = resolve_relative(current_file, target)?;
        {
            let stack = self.stack.borrow();
            if stack.contains(&path) {
                let mut chain = stack.clone();
                chain.push(path);
                return Err(CompileError::IncludeCycle { chain });
            }
            if stack.len() > MAX_INCLUDE_DEPTH {
                return Err(CompileError::IncludeDepth {
                    path: current_file.to_owned(),
                    limit: MAX_INCLUDE_DEPTH,
                });
            }
        }

        self.stack.borrow_mut().push(path.clone());
        let result = self.compiler.render_file(&path, self);
        self.stack.borrow_mut().pop();
        Ok(result?.html)
    }
}

impl Includer for IncludeSession<'_> {
    fn include(&self, current_file: &str, target: &str) -> Result<String, String> {
        self.include_file(current_file, target)
            .map_err(|e| e.to_string())
    }
}
