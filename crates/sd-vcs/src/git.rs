//! [`RepoSync`] implementation driving the `git` executable.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::GitCommand;
use crate::{RepoSpec, RepoSync, SyncError};

/// What a sync does for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPlan {
    /// The working copy exists: `git pull`.
    Pull,
    /// Fresh sparse checkout limited to the given patterns.
    SparseInit {
        /// Contents of `.git/info/sparse-checkout`.
        patterns: Vec<String>,
    },
    /// Fresh full clone.
    Clone,
}

/// Synchronizes repositories into `{content_dir}/{name}` with `git`.
///
/// An existing working copy is pulled. A missing one is cloned, or, when
/// sparse patterns are configured, initialized as a sparse checkout of the
/// repository branch.
#[derive(Debug, Clone)]
pub struct GitSync {
    content_dir: PathBuf,
    sparse_patterns: Vec<String>,
    timeout: Duration,
}

impl GitSync {
    /// Create a syncer writing working copies under `content_dir`.
    #[must_use]
    pub fn new(content_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            content_dir,
            sparse_patterns: Vec::new(),
            timeout,
        }
    }

    /// Use sparse checkouts limited to `patterns` for new working copies.
    #[must_use]
    pub fn with_sparse_patterns(mut self, patterns: Vec<String>) -> Self {
        self.sparse_patterns = patterns;
        self
    }

    fn repo_dir(&self, repo: &RepoSpec) -> PathBuf {
        self.content_dir.join(&repo.name)
    }

    /// Decide how `repo` will be synchronized.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotADirectory`] if the working copy path exists but
    /// is a file, or [`SyncError::Io`] if it cannot be stat'ed.
    pub fn plan(&self, repo: &RepoSpec) -> Result<SyncPlan, SyncError> {
        let dir = self.repo_dir(repo);
        match fs::metadata(&dir) {
            Ok(metadata) if metadata.is_dir() => Ok(SyncPlan::Pull),
            Ok(_) => Err(SyncError::NotADirectory { path: dir }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if self.sparse_patterns.is_empty() {
                    Ok(SyncPlan::Clone)
                } else {
                    Ok(SyncPlan::SparseInit {
                        patterns: self.sparse_patterns.clone(),
                    })
                }
            }
            Err(source) => Err(SyncError::Io { path: dir, source }),
        }
    }

    fn git(&self, dir: &Path) -> GitCommand {
        GitCommand::new().current_dir(dir).timeout(self.timeout)
    }

    fn sync_one(&self, repo: &RepoSpec) -> Result<(), SyncError> {
        let dir = self.repo_dir(repo);
        match self.plan(repo)? {
            SyncPlan::Pull => {
                tracing::info!(repo = %repo.name, "updating repository");
                self.git(&dir).args(["pull", "--quiet"]).execute_success()?;
            }
            SyncPlan::SparseInit { patterns } => {
                tracing::info!(repo = %repo.name, "cloning repository (sparse)");
                self.ensure_content_dir()?;
                self.sparse_init(&dir, repo, &patterns)
                    .inspect_err(|_| discard_partial(&dir))?;
            }
            SyncPlan::Clone => {
                tracing::info!(repo = %repo.name, "cloning repository");
                self.ensure_content_dir()?;
                self.git(&self.content_dir)
                    .args(["clone", "--quiet", repo.clone_url.as_str(), repo.name.as_str()])
                    .execute_success()
                    .inspect_err(|_| discard_partial(&dir))?;
            }
        }
        Ok(())
    }

    fn sparse_init(&self, dir: &Path, repo: &RepoSpec, patterns: &[String]) -> Result<(), SyncError> {
        self.git(&self.content_dir)
            .args(["init", "--quiet", repo.name.as_str()])
            .execute_success()?;
        self.git(dir)
            .args(["config", "core.sparseCheckout", "true"])
            .execute_success()?;
        write_sparse_checkout(dir, patterns)?;
        self.git(dir)
            .args(["remote", "add", "-f", "origin", repo.clone_url.as_str()])
            .execute_success()?;
        self.git(dir)
            .args(["checkout", repo.branch.as_str(), "--quiet"])
            .execute_success()?;
        Ok(())
    }

    fn ensure_content_dir(&self) -> Result<(), SyncError> {
        fs::create_dir_all(&self.content_dir).map_err(|source| SyncError::Io {
            path: self.content_dir.clone(),
            source,
        })
    }
}

/// Remove a working copy left behind by a failed first checkout, so the next
/// sync starts fresh instead of pulling into it.
fn discard_partial(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => tracing::debug!(dir = %dir.display(), "removed incomplete working copy"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove incomplete working copy");
        }
    }
}

fn write_sparse_checkout(repo_dir: &Path, patterns: &[String]) -> Result<(), SyncError> {
    let info_dir = repo_dir.join(".git").join("info");
    fs::create_dir_all(&info_dir).map_err(|source| SyncError::Io {
        path: info_dir.clone(),
        source,
    })?;
    let file = info_dir.join("sparse-checkout");
    let mut contents = patterns.join("\n");
    contents.push('\n');
    fs::write(&file, contents).map_err(|source| SyncError::Io { path: file, source })
}

impl RepoSync for GitSync {
    fn sync(&self, repos: &[RepoSpec]) -> Result<(), SyncError> {
        for repo in repos {
            self.sync_one(repo)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn spec(name: &str) -> RepoSpec {
        RepoSpec {
            name: name.to_owned(),
            clone_url: format!("https://git.example.com/{name}.git"),
            branch: "master".to_owned(),
        }
    }

    #[test]
    fn test_plan_clone_when_missing() {
        let tmp = TempDir::new().unwrap();
        let sync = GitSync::new(tmp.path().to_path_buf(), Duration::from_secs(5));
        assert_eq!(sync.plan(&spec("guide")).unwrap(), SyncPlan::Clone);
    }

    #[test]
    fn test_plan_sparse_when_patterns_configured() {
        let tmp = TempDir::new().unwrap();
        let sync = GitSync::new(tmp.path().to_path_buf(), Duration::from_secs(5))
            .with_sparse_patterns(vec!["**/*.md".to_owned(), "assets/".to_owned()]);
        assert_eq!(
            sync.plan(&spec("guide")).unwrap(),
            SyncPlan::SparseInit {
                patterns: vec!["**/*.md".to_owned(), "assets/".to_owned()],
            }
        );
    }

    #[test]
    fn test_plan_pull_when_directory_exists() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("guide")).unwrap();
        let sync = GitSync::new(tmp.path().to_path_buf(), Duration::from_secs(5))
            .with_sparse_patterns(vec!["**/*.md".to_owned()]);
        assert_eq!(sync.plan(&spec("guide")).unwrap(), SyncPlan::Pull);
    }

    #[test]
    fn test_file_in_place_of_repo_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("guide"), "not a repo").unwrap();
        let sync = GitSync::new(tmp.path().to_path_buf(), Duration::from_secs(5));

        let err = sync.sync(&[spec("guide")]).unwrap_err();
        assert!(matches!(err, SyncError::NotADirectory { .. }), "{err:?}");
    }

    #[test]
    fn test_empty_repo_list_is_ok() {
        let tmp = TempDir::new().unwrap();
        let sync = GitSync::new(tmp.path().join("absent"), Duration::from_secs(5));
        sync.sync(&[]).unwrap();
        assert!(!tmp.path().join("absent").exists());
    }

    fn unreachable_remote(tmp: &TempDir, name: &str) -> RepoSpec {
        RepoSpec {
            clone_url: tmp.path().join("no-such-remote").display().to_string(),
            ..spec(name)
        }
    }

    #[test]
    fn test_failed_sparse_init_leaves_no_working_copy() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        let sync = GitSync::new(content.clone(), Duration::from_secs(30))
            .with_sparse_patterns(vec!["**/*.md".to_owned()]);
        let repo = unreachable_remote(&tmp, "guide");

        assert!(sync.sync(std::slice::from_ref(&repo)).is_err());
        assert!(!content.join("guide").exists());
        // The next pass retries the checkout instead of pulling
        assert!(matches!(sync.plan(&repo).unwrap(), SyncPlan::SparseInit { .. }));
    }

    #[test]
    fn test_failed_clone_leaves_no_working_copy() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        let sync = GitSync::new(content.clone(), Duration::from_secs(30));
        let repo = unreachable_remote(&tmp, "guide");

        assert!(sync.sync(std::slice::from_ref(&repo)).is_err());
        assert!(!content.join("guide").exists());
        assert_eq!(sync.plan(&repo).unwrap(), SyncPlan::Clone);
    }

    #[test]
    fn test_discard_partial_missing_dir_is_noop() {
        let tmp = TempDir::new().unwrap();
        discard_partial(&tmp.path().join("absent"));
        assert!(tmp.path().exists());
    }

    #[test]
    fn test_write_sparse_checkout() {
        let tmp = TempDir::new().unwrap();
        write_sparse_checkout(
            tmp.path(),
            &["**/*.md".to_owned(), "**/*.markdown".to_owned(), "assets/".to_owned()],
        )
        .unwrap();
        let contents =
            fs::read_to_string(tmp.path().join(".git/info/sparse-checkout")).unwrap();
        assert_eq!(contents, "**/*.md\n**/*.markdown\nassets/\n");
    }
}
