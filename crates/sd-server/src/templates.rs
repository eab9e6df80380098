//! Themes and page templates.
//!
//! A theme is a directory that may hold template files and static assets.
//! Template files are looked up by the names in [`TemplateNames`]; a theme
//! without a given file, or a theme with no directory at all, uses the
//! built-in template of that kind.
//!
//! Templates are minijinja sources rendered without auto-escaping: `body` and
//! other HTML values are inserted verbatim, plain-text values are escaped in
//! the template with `|e`. Link targets are percent-encoded before they reach
//! a template.
//!
//! Each theme's templates are read and compiled once, on the first request
//! for that theme, and reused afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use minijinja::{Environment, Value, context};
use sd_config::{TemplateNames, ThemeConfig};
use sd_renderer::escape_html;
use sd_storage_fs::{SourceDir, SourceError};

use crate::error::ServerError;

/// Page layout. Receives `title`, `body` and, for documents, `toc`, `repo`
/// and `breadcrumb`.
const DOC_TEMPLATE: &str = r##"<!doctype html>
<html lang="en">
<head><title>{{ title|e }}</title><meta charset="utf-8"></head>
<body>
{%- if breadcrumb %}<nav class="breadcrumb">{% for crumb in breadcrumb %}<a href="{{ crumb.href }}">{{ crumb.title|e }}</a>{% if not loop.last %} / {% endif %}{% endfor %}</nav>{% endif %}
{%- if toc %}<nav class="toc"><ul>{% for entry in toc %}<li><a href="#{{ entry.id }}">{{ entry.title|e }}</a></li>{% endfor %}</ul></nav>{% endif %}
{{- body }}
{%- if repo and repo.file_url %}<p class="source"><a href="{{ repo.file_url|e }}">View source</a></p>{% endif -%}
</body>
</html>"##;

/// Index body. Receives `folders` (`name`, `title`).
const INDEX_TEMPLATE: &str = r#"<h1>Welcome :-)</h1>
<p>This is the root page of your docs, please select a doc to browse :</p>
{% for folder in folders %}
<h3><a title="{{ folder.title|e }}" href="{{ folder.name|e }}/">{{ folder.title|e }}</a></h3>
{% endfor %}"#;

/// Search results body. Receives `q`, `encoded_q` and `docs` (`href`, `path`).
const SEARCH_TEMPLATE: &str = r#"<h3>Search result matching : <q>{{ q|e }}</q></h3>
{% if docs %}
<ul>
  {% for doc in docs %}
  <li><a href="{{ doc.href }}?highlight={{ encoded_q }}">{{ doc.path|e }}</a></li>
  {% endfor %}
</ul>
{% else %}
<p><strong>Ooops… it seems that no content matches your query :-(</strong></p>
{% endif %}"#;

/// Search form body.
const SEARCHFORM_TEMPLATE: &str = r#"<div class="searchform-container">
  <h2>Search content</h2>
  <form id="search-form" method="GET" action="/">
      <input type="text" name="q" class="form-control input-lg">
      <input type="submit" value="Search">
  </form>
</div>"#;

/// Kinds of template a theme provides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Template {
    Doc,
    Index,
    Search,
    SearchForm,
}

impl Template {
    const ALL: [Self; 4] = [Self::Doc, Self::Index, Self::Search, Self::SearchForm];

    fn name(self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Index => "index",
            Self::Search => "search",
            Self::SearchForm => "searchform",
        }
    }

    fn builtin(self) -> &'static str {
        match self {
            Self::Doc => DOC_TEMPLATE,
            Self::Index => INDEX_TEMPLATE,
            Self::Search => SEARCH_TEMPLATE,
            Self::SearchForm => SEARCHFORM_TEMPLATE,
        }
    }

    fn file_name(self, names: &TemplateNames) -> &str {
        match self {
            Self::Doc => &names.doc,
            Self::Index => &names.index,
            Self::Search => &names.search,
            Self::SearchForm => &names.searchform,
        }
    }
}

/// Configured themes.
#[derive(Debug)]
pub(crate) struct Themes {
    default: String,
    dirs: BTreeMap<String, PathBuf>,
    names: TemplateNames,
    builtin: Arc<Environment<'static>>,
    compiled: Mutex<HashMap<String, Arc<Environment<'static>>>>,
}

impl Themes {
    pub(crate) fn new(config: &ThemeConfig) -> Self {
        Self {
            default: config.default.clone(),
            dirs: config.dirs.clone(),
            names: config.templates.clone(),
            builtin: Arc::new(builtin_environment()),
            compiled: Mutex::new(HashMap::new()),
        }
    }

    /// Theme for a request: the requested one, else the default.
    pub(crate) fn select(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.default.as_str())
            .to_owned()
    }

    /// Compiled templates of `theme`.
    ///
    /// Themes without a directory share the built-in environment. A theme
    /// whose templates fail to compile is not cached, so a fixed file is
    /// picked up by the next request.
    fn environment(&self, theme: &str) -> Result<Arc<Environment<'static>>, minijinja::Error> {
        let Some(dir) = self.dirs.get(theme) else {
            return Ok(Arc::clone(&self.builtin));
        };
        let mut compiled = self.compiled.lock().unwrap();
        if let Some(env) = compiled.get(theme) {
            return Ok(Arc::clone(env));
        }
        let env = Arc::new(self.compile(dir)?);
        tracing::debug!(theme, dir = %dir.display(), "compiled theme templates");
        compiled.insert(theme.to_owned(), Arc::clone(&env));
        Ok(env)
    }

    fn compile(&self, dir: &Path) -> Result<Environment<'static>, minijinja::Error> {
        let mut env = Environment::new();
        for template in Template::ALL {
            let path = dir.join(template.file_name(&self.names));
            let source = match fs::read_to_string(&path) {
                Ok(source) => source,
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %path.display(), error = %e, "unreadable template, using built-in");
                    }
                    template.builtin().to_owned()
                }
            };
            env.add_template_owned(template.name(), source)?;
        }
        Ok(env)
    }

    /// Render one template of `theme` with `ctx`.
    pub(crate) fn render(&self, theme: &str, template: Template, ctx: Value) -> Result<String, ServerError> {
        let env = self.environment(theme)?;
        Ok(env.get_template(template.name())?.render(ctx)?)
    }

    /// Render a full page: `body` wrapped in the layout with `title`.
    pub(crate) fn page(&self, theme: &str, title: &str, body: &str) -> Result<String, ServerError> {
        self.render(theme, Template::Doc, context! { title, body })
    }

    /// Read a static asset from the theme directory.
    pub(crate) fn asset(&self, theme: &str, path: &str) -> Result<Vec<u8>, SourceError> {
        let Some(dir) = self.dirs.get(theme) else {
            return Err(SourceError::NotFound {
                path: path.to_owned(),
            });
        };
        SourceDir::new(dir.clone()).read_raw(path)
    }
}

fn builtin_environment() -> Environment<'static> {
    let mut env = Environment::new();
    for template in Template::ALL {
        if let Err(e) = env.add_template(template.name(), template.builtin()) {
            tracing::error!(template = template.name(), error = %e, "built-in template does not compile");
        }
    }
    env
}

/// Built-in layout around `body`, for responses rendered without a theme.
pub(crate) fn builtin_page(title: &str, body: &str) -> String {
    Environment::new()
        .render_str(DOC_TEMPLATE, context! { title, body })
        .unwrap_or_else(|_| format!("<!doctype html><title>{}</title>{body}", escape_html(title)))
}
