//! FTP transport layer
//!
//! Pooled, authenticated FTP/FTPS sessions behind cloneable handles.

pub mod backend;
pub mod error;
pub mod pool;
pub mod session;

pub use backend::{Connector, FtpBackend, FtpConnector, RemoteBackend};
pub use error::FtpError;
pub use pool::ConnectionPool;
pub use session::{SessionCommand, SessionHandle};
