//! Scoped ownership of a started job's working directory and registry
//! entry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::registry::JobStore;
use crate::types::JobId;

/// Owner of `<work_root>/<job id>` plus the job's registry entry for the
/// duration of a started job.
///
/// Both are released exactly once: explicitly through [`Workspace::release`]
/// in the pipeline's epilogue, or as a blocking best-effort fallback for the
/// directory in `Drop` when the owning task was aborted first. The registry
/// entry cannot be removed from `Drop` (the store is async); an aborted task
/// leaves it to the abandonment sweeper.
pub(crate) struct Workspace {
    dir: PathBuf,
    job: JobId,
    jobs: Arc<dyn JobStore>,
    released: bool,
}

impl Workspace {
    /// Create the working directory for `job` under `root`.
    pub(crate) async fn create(
        root: &Path,
        job: &JobId,
        jobs: Arc<dyn JobStore>,
    ) -> std::io::Result<Self> {
        let dir = root.join(job.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(job_id = %job, dir = %dir.display(), "Workspace created");
        Ok(Self {
            dir,
            job: job.clone(),
            jobs,
            released: false,
        })
    }

    /// The owned directory.
    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove the registry entry, then the directory and everything in it.
    /// Directory removal errors are logged and swallowed.
    pub(crate) async fn release(mut self) {
        self.released = true;
        self.jobs.remove(&self.job).await;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to remove workspace");
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Workspace leaked at drop");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::registry::MemoryJobStore;
    use crate::types::{ChatId, UserId};

    fn store() -> Arc<dyn JobStore> {
        Arc::new(MemoryJobStore::new())
    }

    #[tokio::test]
    async fn create_makes_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let id = JobId::generate();

        let workspace = Workspace::create(root.path(), &id, store()).await.unwrap();

        assert!(workspace.dir().is_dir());
        assert_eq!(workspace.dir(), root.path().join(id.as_str()));
        workspace.release().await;
    }

    #[tokio::test]
    async fn release_removes_directory_and_contents() {
        let root = tempfile::tempdir().unwrap();
        let id = JobId::generate();
        let workspace = Workspace::create(root.path(), &id, store()).await.unwrap();
        let dir = workspace.dir().to_path_buf();
        tokio::fs::write(dir.join("artifact.mkv"), b"data")
            .await
            .unwrap();

        workspace.release().await;

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn release_removes_the_registry_entry() {
        let root = tempfile::tempdir().unwrap();
        let jobs = store();
        let job = jobs
            .create("https://example.com/v".to_string(), UserId(1), ChatId(1))
            .await;

        let workspace = Workspace::create(root.path(), &job.id, jobs.clone())
            .await
            .unwrap();
        workspace.release().await;

        assert!(jobs.get(&job.id).await.is_none());
    }

    #[tokio::test]
    async fn drop_without_release_still_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let id = JobId::generate();
        let dir = {
            let workspace = Workspace::create(root.path(), &id, store()).await.unwrap();
            workspace.dir().to_path_buf()
        };

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn release_tolerates_an_already_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let id = JobId::generate();
        let workspace = Workspace::create(root.path(), &id, store()).await.unwrap();
        tokio::fs::remove_dir_all(workspace.dir()).await.unwrap();

        workspace.release().await;
    }
}
