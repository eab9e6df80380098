//! `${VAR}` expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references using the process environment.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    expand_with(value, field, |var| std::env::var(var).ok())
}

/// Expand references with a caller-supplied lookup.
///
/// Bare `$VAR` is left untouched; only the braced form is expanded. A braced
/// reference without a default whose variable is unset is an error naming both
/// the variable and the config field.
pub(crate) fn expand_with<F>(value: &str, field: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| {
        lookup(var).map(Some).ok_or_else(|| var.to_owned())
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} not set", e.cause),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_literal_unchanged() {
        let out = expand_with("git@example.com:team/docs", "repos.ssh", env(&[])).unwrap();
        assert_eq!(out, "git@example.com:team/docs");
    }

    #[test]
    fn test_braced_var() {
        let out = expand_with("https://${GIT_HOST}/docs", "repos.url", env(&[("GIT_HOST", "git.local")]))
            .unwrap();
        assert_eq!(out, "https://git.local/docs");
    }

    #[test]
    fn test_default_used_when_unset() {
        let out = expand_with("${BIND:-0.0.0.0}", "server.host", env(&[])).unwrap();
        assert_eq!(out, "0.0.0.0");
    }

    #[test]
    fn test_default_ignored_when_set() {
        let out = expand_with("${BIND:-0.0.0.0}", "server.host", env(&[("BIND", "::1")])).unwrap();
        assert_eq!(out, "::1");
    }

    #[test]
    fn test_missing_var_names_field() {
        let err = expand_with("${NOPE}", "repos.url", env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        let msg = err.to_string();
        assert!(msg.contains("NOPE"), "{msg}");
        assert!(msg.contains("repos.url"), "{msg}");
    }

    #[test]
    fn test_bare_dollar_not_expanded() {
        let out = expand_with("/blob/$branch/{{file}}", "repos.file_pattern", env(&[])).unwrap();
        assert_eq!(out, "/blob/$branch/{{file}}");
    }
}
