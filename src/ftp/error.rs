//! FTP transport error types

use thiserror::Error;

/// Errors from the FTP transport layer.
///
/// Reply-code classes are collapsed into the variants the retry classifier
/// cares about: connection-shaped failures are retryable, everything that the
/// server decided on purpose (authentication, missing files, bad names) is not.
#[derive(Debug, Error)]
pub enum FtpError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// 550-class reply: the path does not exist or is not accessible.
    #[error("file unavailable: {0}")]
    FileUnavailable(String),

    /// 553-class reply: the name itself was rejected.
    #[error("invalid remote path: {0}")]
    InvalidPath(String),

    /// Data-channel failure mid-transfer (425/426/450/451).
    #[error("transfer aborted: {0}")]
    TransferAborted(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("FTP protocol error: {0}")]
    ProtocolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The session owner is gone; the handle can no longer reach the server.
    #[error("session disconnected")]
    Disconnected,
}

impl FtpError {
    /// Whether this failure means the control connection itself is suspect,
    /// so the session owner should re-handshake before the next command.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            FtpError::ConnectionFailed(_)
                | FtpError::Timeout(_)
                | FtpError::IoError(_)
                | FtpError::Disconnected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_classification() {
        assert!(FtpError::ConnectionFailed("reset".into()).is_connection_error());
        assert!(FtpError::Timeout("30s".into()).is_connection_error());
        assert!(FtpError::Disconnected.is_connection_error());
        assert!(!FtpError::FileUnavailable("/f".into()).is_connection_error());
        assert!(!FtpError::AuthenticationFailed("530".into()).is_connection_error());
    }
}
