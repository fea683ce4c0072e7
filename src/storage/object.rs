//! FTP-backed storage objects
//!
//! One storage object per query: a parsed endpoint + path and a handle to the
//! pooled session for that endpoint. Objects share sessions and never own
//! them. Every operation is a single request/response exchange wrapped in the
//! retry combinator; there is no cross-call state beyond the session itself.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::error::StorageError;
use super::glob;
use super::path_utils::{ancestor_dirs, join_remote_path, normalize_remote_path, parent_dir};
use super::{StorageGlob, StorageRead, StorageWrite};
use crate::ftp::SessionHandle;
use crate::query::{EndpointKey, ParsedQuery};
use crate::retry::{with_retry, RetryPolicy};

#[derive(Debug)]
pub struct FtpStorageObject {
    query: ParsedQuery,
    /// Query path with trailing slashes folded away.
    path: String,
    session: SessionHandle,
    pub(crate) retry: RetryPolicy,
}

impl FtpStorageObject {
    pub(crate) fn new(query: ParsedQuery, session: SessionHandle) -> Self {
        let path = normalize_remote_path(&query.path);
        Self {
            query,
            path,
            session,
            retry: RetryPolicy::default(),
        }
    }

    pub fn endpoint(&self) -> &EndpointKey {
        &self.query.endpoint
    }

    pub fn remote_path(&self) -> &str {
        &self.path
    }

    /// Staging-area suffix for this object, unique per query:
    /// `host:port/path`.
    pub fn local_suffix(&self) -> String {
        format!(
            "{}/{}",
            self.query.endpoint.netloc(),
            self.path.trim_start_matches('/')
        )
    }

    pub(crate) fn session(&self) -> &SessionHandle {
        &self.session
    }

    async fn exists_inner(&self) -> Result<bool, StorageError> {
        Ok(self.session.exists(&self.path).await?)
    }

    async fn mtime_inner(&self) -> Result<i64, StorageError> {
        Ok(self.session.mtime(&self.path).await?)
    }

    async fn size_inner(&self) -> Result<u64, StorageError> {
        Ok(self.session.size(&self.path).await?)
    }

    async fn retrieve_inner(&self, local: &Path) -> Result<(), StorageError> {
        if self.session.is_dir(&self.path).await? {
            self.retrieve_tree(&self.path, local).await
        } else {
            if let Some(parent) = local.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            let data = self.session.download(&self.path).await?;
            tokio::fs::write(local, &data).await?;
            Ok(())
        }
    }

    /// Mirror a remote directory into `local`, preserving relative structure.
    async fn retrieve_tree(&self, remote: &str, local: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(local).await?;
        let entries = self.session.list_dir(remote).await?;
        for entry in entries {
            let remote_child = join_remote_path(remote, &entry.name);
            let local_child = local.join(&entry.name);
            if entry.is_dir() {
                // Boxed to avoid infinite future size.
                Box::pin(self.retrieve_tree(&remote_child, &local_child)).await?;
            } else {
                let data = self.session.download(&remote_child).await?;
                tokio::fs::write(&local_child, &data).await?;
            }
        }
        Ok(())
    }

    async fn store_inner(&self, local: &Path) -> Result<(), StorageError> {
        let metadata = tokio::fs::metadata(local).await?;
        if metadata.is_dir() {
            self.ensure_remote_dirs(&self.path).await?;
            self.store_tree(local, &self.path).await
        } else {
            if let Some(parent) = parent_dir(&self.path) {
                if parent != "/" {
                    self.ensure_remote_dirs(parent).await?;
                }
            }
            let data = tokio::fs::read(local).await?;
            self.session.upload(&self.path, data).await?;
            Ok(())
        }
    }

    /// Create `dir` and every missing ancestor, tolerating levels that
    /// already exist.
    async fn ensure_remote_dirs(&self, dir: &str) -> Result<(), StorageError> {
        for ancestor in ancestor_dirs(dir) {
            match self.session.mkdir(&ancestor).await {
                Ok(()) => debug!("created remote directory {ancestor}"),
                Err(err) => {
                    if self.session.is_dir(&ancestor).await? {
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    async fn store_tree(&self, local: &Path, remote: &str) -> Result<(), StorageError> {
        let mut entries = tokio::fs::read_dir(local).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let remote_child = join_remote_path(remote, &name);
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                self.ensure_remote_dirs(&remote_child).await?;
                Box::pin(self.store_tree(&entry.path(), &remote_child)).await?;
            } else {
                let data = tokio::fs::read(entry.path()).await?;
                self.session.upload(&remote_child, data).await?;
            }
        }
        Ok(())
    }

    async fn remove_inner(&self) -> Result<(), StorageError> {
        if self.session.is_dir(&self.path).await? {
            self.remove_tree(&self.path).await
        } else {
            self.session.remove_file(&self.path).await?;
            Ok(())
        }
    }

    /// Depth-first subtree delete: children first, then the directory itself.
    async fn remove_tree(&self, remote: &str) -> Result<(), StorageError> {
        let entries = self.session.list_dir(remote).await?;
        for entry in entries {
            let child = join_remote_path(remote, &entry.name);
            if entry.is_dir() {
                Box::pin(self.remove_tree(&child)).await?;
            } else {
                self.session.remove_file(&child).await?;
            }
        }
        self.session.remove_dir(remote).await?;
        Ok(())
    }

    async fn candidates_inner(&self) -> Result<Vec<String>, StorageError> {
        glob::list_candidates(&self.session, &self.query.path).await
    }
}

#[async_trait]
impl StorageRead for FtpStorageObject {
    async fn exists(&self) -> Result<bool, StorageError> {
        with_retry("exists", &self.retry, || self.exists_inner()).await
    }

    async fn mtime(&self) -> Result<i64, StorageError> {
        with_retry("mtime", &self.retry, || self.mtime_inner()).await
    }

    async fn size(&self) -> Result<u64, StorageError> {
        with_retry("size", &self.retry, || self.size_inner()).await
    }

    async fn retrieve(&self, local: &Path) -> Result<(), StorageError> {
        info!("retrieving {} to {}", self.path, local.display());
        with_retry("retrieve", &self.retry, || self.retrieve_inner(local)).await
    }
}

#[async_trait]
impl StorageWrite for FtpStorageObject {
    async fn store(&self, local: &Path) -> Result<(), StorageError> {
        info!("storing {} to {}", local.display(), self.path);
        with_retry("store", &self.retry, || self.store_inner(local)).await
    }

    async fn remove(&self) -> Result<(), StorageError> {
        info!("removing {}", self.path);
        with_retry("remove", &self.retry, || self.remove_inner()).await
    }
}

#[async_trait]
impl StorageGlob for FtpStorageObject {
    async fn list_candidates(&self) -> Result<Vec<String>, StorageError> {
        with_retry("list_candidates", &self.retry, || self.candidates_inner()).await
    }
}
