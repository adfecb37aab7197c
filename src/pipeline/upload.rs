//! Per-request temporary workspace for an uploaded screenshot.
//!
//! The upload and its cropped derivative live together in a uniquely named
//! directory under the configured upload root. The directory is owned by a
//! [`RequestWorkspace`]; dropping it removes both files on every exit path,
//! whether the flow succeeded, returned an error, or was cancelled because
//! the client disconnected.

use crate::error::RizzError;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const UPLOAD_FILE: &str = "upload";
const CROPPED_FILE: &str = "cropped-upload";

/// Scoped storage for one request's image files.
#[derive(Debug)]
pub struct RequestWorkspace {
    dir: TempDir,
    upload: PathBuf,
    cropped: PathBuf,
}

impl RequestWorkspace {
    /// Create a fresh directory under `root` and write the uploaded bytes into it.
    ///
    /// The filesystem work runs inside `spawn_blocking`.
    pub async fn create(root: &Path, bytes: &[u8]) -> Result<Self, RizzError> {
        let root = root.to_path_buf();
        let bytes = bytes.to_vec();
        let join_root = root.clone();
        tokio::task::spawn_blocking(move || Self::create_blocking(&root, &bytes))
            .await
            .map_err(|e| RizzError::Workspace {
                path: join_root,
                source: io::Error::other(e.to_string()),
            })?
    }

    fn create_blocking(root: &Path, bytes: &[u8]) -> Result<Self, RizzError> {
        let workspace_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| RizzError::Workspace { path, source }
        };

        std::fs::create_dir_all(root).map_err(workspace_err(root))?;
        let dir = tempfile::Builder::new()
            .prefix("req-")
            .tempdir_in(root)
            .map_err(workspace_err(root))?;

        let upload = dir.path().join(UPLOAD_FILE);
        let cropped = dir.path().join(CROPPED_FILE);
        std::fs::write(&upload, bytes).map_err(workspace_err(&upload))?;

        debug!(
            "Stored {} byte upload in {}",
            bytes.len(),
            dir.path().display()
        );

        Ok(Self {
            dir,
            upload,
            cropped,
        })
    }

    /// Path of the original upload.
    pub fn upload_path(&self) -> &Path {
        &self.upload
    }

    /// Path the cropper writes to.
    pub fn cropped_path(&self) -> &Path {
        &self.cropped
    }

    /// Remove the workspace on the blocking pool and report failures.
    ///
    /// Dropping the workspace removes it too, but silently and inline; that
    /// only happens when the request future is cancelled.
    pub async fn close(self) {
        let path = self.dir.path().to_path_buf();
        let dir = self.dir;
        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to remove workspace {}: {}", path.display(), e),
            Err(e) => warn!("Workspace removal for {} did not finish: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_dir(ws: &RequestWorkspace) -> PathBuf {
        ws.upload_path().parent().unwrap().to_path_buf()
    }

    #[tokio::test]
    async fn create_writes_upload_and_close_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(root.path(), b"hello").await.unwrap();

        assert_eq!(std::fs::read(ws.upload_path()).unwrap(), b"hello");
        assert!(!ws.cropped_path().exists());
        std::fs::write(ws.cropped_path(), b"crop").unwrap();

        let dir = workspace_dir(&ws);
        ws.close().await;
        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn drop_removes_workspace() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let ws = RequestWorkspace::create(root.path(), b"x").await.unwrap();
            std::fs::write(ws.cropped_path(), b"y").unwrap();
            workspace_dir(&ws)
        };
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn concurrent_workspaces_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let a = RequestWorkspace::create(root.path(), b"a").await.unwrap();
        let b = RequestWorkspace::create(root.path(), b"b").await.unwrap();
        assert_ne!(a.upload_path(), b.upload_path());
        assert_eq!(std::fs::read(a.upload_path()).unwrap(), b"a");
        assert_eq!(std::fs::read(b.upload_path()).unwrap(), b"b");
    }

    #[tokio::test]
    async fn missing_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("nested/uploads");
        let ws = RequestWorkspace::create(&nested, b"z").await.unwrap();
        assert!(ws.upload_path().starts_with(&nested));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn create_and_close_leave_the_runtime_responsive() {
        let root = tempfile::tempdir().unwrap();
        let ticker = tokio::spawn(async {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
        });

        let ws = RequestWorkspace::create(root.path(), &vec![7u8; 64 * 1024])
            .await
            .unwrap();
        assert_eq!(std::fs::metadata(ws.upload_path()).unwrap().len(), 64 * 1024);
        ws.close().await;

        ticker.await.unwrap();
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
