//! Repository Materializer: shallow-clones a repository into scoped temporary storage.
//!
//! The clone lives inside a `TempDir` owned by `ClonedRepository`; dropping the
//! value removes the directory, whichever way the caller exits. The `git`
//! child process is killed if the clone future is dropped mid-flight.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::originality::models::RepositoryLink;

#[derive(Debug, Error)]
pub enum CloneError {
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git clone failed: {0}")]
    Git(String),

    #[error("git clone timed out after {0}s")]
    TimedOut(u64),
}

/// An ephemeral local copy of a repository. Removed from disk on drop.
#[derive(Debug)]
pub struct ClonedRepository {
    dir: TempDir,
    root: PathBuf,
}

impl ClonedRepository {
    /// Wraps an already-populated directory inside `dir`.
    pub fn new(dir: TempDir, root: PathBuf) -> Self {
        Self { dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The scope directory that will be removed on drop.
    pub fn scope(&self) -> &Path {
        self.dir.path()
    }
}

/// Materializes a repository link on local disk.
///
/// Carried by the pipeline as `Arc<dyn RepoFetcher>`.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    async fn fetch(&self, link: &RepositoryLink) -> Result<ClonedRepository, CloneError>;
}

/// `git` CLI based fetcher: `git clone --depth 1`.
pub struct GitCloner {
    timeout: Duration,
}

impl GitCloner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RepoFetcher for GitCloner {
    async fn fetch(&self, link: &RepositoryLink) -> Result<ClonedRepository, CloneError> {
        let dir = tempfile::Builder::new()
            .prefix("screener-clone-")
            .tempdir()
            .map_err(CloneError::TempDir)?;
        let root = dir.path().join("repo");

        debug!("Cloning {} into {}", link.url, root.display());

        let mut cmd = Command::new("git");
        cmd.args(["clone", "--depth", "1", "--quiet", "--"])
            .arg(&link.url)
            .arg(&root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| CloneError::TimedOut(self.timeout.as_secs()))?
            .map_err(CloneError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            return Err(CloneError::Git(if message.is_empty() {
                format!("git exited with {}", output.status)
            } else {
                message.to_string()
            }));
        }

        info!("Cloned {}", link.url);
        Ok(ClonedRepository::new(dir, root))
    }
}
