//! Repository synchronization for servedown.
//!
//! Documentation contexts can be backed by git repositories that are mirrored
//! into the source directory before each processing pass. [`RepoSync`] is the
//! seam the pipeline depends on; [`GitSync`] implements it by running the
//! `git` executable.

mod command;
mod git;

use std::path::PathBuf;
use std::time::Duration;

pub use git::{GitSync, SyncPlan};

/// A repository to mirror into `{content_dir}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSpec {
    /// Directory name under the content directory (the context name).
    pub name: String,
    /// Address passed to `git clone` / `git remote add`.
    pub clone_url: String,
    /// Branch checked out by sparse checkouts.
    pub branch: String,
}

/// Repository synchronization failure.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The command could not be started or waited on.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// Command line.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The command exited unsuccessfully.
    #[error("`{command}` failed{}: {stderr}", status.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    Command {
        /// Command line.
        command: String,
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
    /// The command ran past its timeout and was killed.
    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    Timeout {
        /// Command line.
        command: String,
        /// Timeout that was exceeded.
        timeout: Duration,
    },
    /// The working copy path exists and is not a directory.
    #[error("{} exists and is not a directory", path.display())]
    NotADirectory {
        /// Working copy path.
        path: PathBuf,
    },
    /// Filesystem failure while preparing a working copy.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Brings local working copies up to date with their remotes.
pub trait RepoSync: Send + Sync {
    /// Synchronize `repos` in order, stopping at the first failure.
    fn sync(&self, repos: &[RepoSpec]) -> Result<(), SyncError>;
}
