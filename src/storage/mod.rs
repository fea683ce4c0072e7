//! Storage object layer
//!
//! The uniform contract the host programs against: capability traits for
//! reading, writing, and glob enumeration, composed by the FTP-backed
//! [`FtpStorageObject`].

pub mod error;
pub mod glob;
pub mod object;
pub mod path_utils;
pub mod types;

use std::path::Path;

use async_trait::async_trait;

pub use error::StorageError;
pub use glob::constant_prefix;
pub use object::FtpStorageObject;
pub use types::{EntryKind, RemoteEntry};

/// Read-side storage capabilities: metadata queries and downloads.
#[async_trait]
pub trait StorageRead {
    /// True iff the remote path resolves to a file or directory.
    ///
    /// Connection failures are surfaced as errors, never as `false`.
    async fn exists(&self) -> Result<bool, StorageError>;

    /// Modification time of the remote path as a Unix timestamp. Errors when
    /// the path does not exist.
    async fn mtime(&self) -> Result<i64, StorageError>;

    /// Byte size of the remote file. Directories error: FTP `SIZE` is only
    /// defined for regular files, and no substitute semantics are invented.
    async fn size(&self) -> Result<u64, StorageError>;

    /// Copy the remote path to `local`. A remote directory is mirrored
    /// recursively, creating local directories (including empty ones) as
    /// needed; a file is copied byte-for-byte.
    async fn retrieve(&self, local: &Path) -> Result<(), StorageError>;
}

/// Write-side storage capabilities: uploads and deletion.
#[async_trait]
pub trait StorageWrite {
    /// Upload `local` to the remote path, creating intermediate remote
    /// directories first. A local directory uploads recursively, including
    /// empty subdirectories.
    async fn store(&self, local: &Path) -> Result<(), StorageError>;

    /// Delete the remote path. A directory is removed with its entire
    /// subtree; a file is removed alone. Deleting a nonexistent path surfaces
    /// the server's error.
    async fn remove(&self) -> Result<(), StorageError>;
}

/// Wildcard-candidate enumeration capability.
#[async_trait]
pub trait StorageGlob {
    /// Concrete candidate paths under the query's wildcard-free prefix: files
    /// at any depth and empty directories; never non-empty directories.
    async fn list_candidates(&self) -> Result<Vec<String>, StorageError>;
}
