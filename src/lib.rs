//! ftpstore - pooled FTP/FTPS storage backend
//!
//! Exposes a uniform storage-object contract (existence check, metadata
//! query, upload, download, delete, wildcard-glob candidate enumeration)
//! over FTP endpoints, reusing one authenticated session per endpoint and
//! retrying transient failures around every remote operation.
//!
//! # Layout
//!
//! - [`query`]: query parsing (`ftp[s]://host[:port]/path`) into endpoint
//!   identity + remote path
//! - [`ftp`]: the transport layer: session owner threads, the connection
//!   pool, and the `RemoteBackend` primitives
//! - [`retry`]: the bounded-retry combinator wrapped around every remote call
//! - [`storage`]: capability traits and the FTP-backed storage object
//! - [`provider`]: the facade the host constructs and hands queries to

pub mod config;
pub mod ftp;
pub mod provider;
pub mod query;
pub mod retry;
pub mod storage;

pub use config::ProviderSettings;
pub use ftp::{ConnectionPool, FtpError, SessionHandle};
pub use provider::{ExampleQuery, FtpStorageProvider, QueryValidation};
pub use query::{parse_query, EndpointKey, ParsedQuery, Protocol, QueryError};
pub use retry::RetryPolicy;
pub use storage::{
    FtpStorageObject, StorageError, StorageGlob, StorageRead, StorageWrite,
};
