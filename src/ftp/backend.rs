//! Remote filesystem backends
//!
//! [`RemoteBackend`] is the minimal blocking surface the session owner drives:
//! existence/kind probes, listings, metadata, byte transfers, and directory
//! management. The storage-layer tree walks are written entirely against these
//! primitives, so nothing above this module assumes the transport has a path
//! abstraction of its own.

use std::io::Cursor;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError as TransportError, Mode, NativeTlsConnector, NativeTlsFtpStream, Status};
use tracing::{debug, info};

use super::error::FtpError;
use super::session::SessionHandle;
use crate::config::ProviderSettings;
use crate::query::{EndpointKey, Protocol};
use crate::storage::path_utils::join_remote_path;
use crate::storage::types::{EntryKind, RemoteEntry};

/// Timeout for establishing the control connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking remote-filesystem primitives bound to one authenticated session.
pub trait RemoteBackend: Send {
    /// True if the path resolves to a file or directory.
    fn exists(&mut self, path: &str) -> Result<bool, FtpError>;

    /// True if the path resolves to a directory.
    fn is_dir(&mut self, path: &str) -> Result<bool, FtpError>;

    /// Entries directly under a directory, `.`/`..` excluded.
    fn list_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, FtpError>;

    /// Modification time as a Unix timestamp.
    fn mtime(&mut self, path: &str) -> Result<i64, FtpError>;

    /// Size in bytes of a regular file.
    fn size(&mut self, path: &str) -> Result<u64, FtpError>;

    /// Read a whole remote file into memory.
    fn download(&mut self, path: &str) -> Result<Vec<u8>, FtpError>;

    /// Write a whole remote file; returns the byte count written.
    fn upload(&mut self, path: &str, data: &[u8]) -> Result<u64, FtpError>;

    /// Create a single directory; the parent must already exist.
    fn mkdir(&mut self, path: &str) -> Result<(), FtpError>;

    /// Delete a regular file.
    fn remove_file(&mut self, path: &str) -> Result<(), FtpError>;

    /// Delete an empty directory.
    fn remove_dir(&mut self, path: &str) -> Result<(), FtpError>;

    /// Tear down and re-establish the session after a connection failure.
    fn reconnect(&mut self) -> Result<(), FtpError>;

    /// Close the session cleanly.
    fn quit(&mut self) -> Result<(), FtpError>;
}

/// `RemoteBackend` over an FTP/FTPS control connection.
///
/// Directory detection uses a `CWD` probe (restoring the login directory
/// afterwards) because plain FTP has no stat command that distinguishes kinds;
/// listings use `NLST` with a per-entry probe for the same reason.
pub struct FtpBackend {
    stream: NativeTlsFtpStream,
    endpoint: EndpointKey,
    settings: ProviderSettings,
    /// Login directory, restored after every `CWD` probe.
    home: String,
}

impl FtpBackend {
    /// Connect, optionally upgrade to TLS, authenticate, and switch to binary
    /// transfers. This is the only place authentication happens.
    pub fn connect(endpoint: &EndpointKey, settings: &ProviderSettings) -> Result<Self, FtpError> {
        let mut stream = Self::open_stream(endpoint, settings)?;
        let home = stream.pwd().map_err(map_transport_error)?;
        info!("session established for {} (home {})", endpoint, home);
        Ok(Self {
            stream,
            endpoint: endpoint.clone(),
            settings: settings.clone(),
            home,
        })
    }

    fn open_stream(
        endpoint: &EndpointKey,
        settings: &ProviderSettings,
    ) -> Result<NativeTlsFtpStream, FtpError> {
        let addr = resolve_addr(&endpoint.host, endpoint.port)?;
        debug!("connecting to {} ({})", endpoint, addr);

        let stream = NativeTlsFtpStream::connect_timeout(addr, CONNECT_TIMEOUT)
            .map_err(map_transport_error)?;

        let mut stream = match endpoint.protocol {
            Protocol::Plain => stream,
            Protocol::Secure => {
                let tls = TlsConnector::new().map_err(|e| FtpError::Tls(e.to_string()))?;
                stream
                    .into_secure(NativeTlsConnector::from(tls), &endpoint.host)
                    .map_err(map_transport_error)?
            }
        };

        stream
            .login(settings.effective_username(), settings.effective_password())
            .map_err(map_login_error)?;

        stream.set_mode(if settings.active_mode {
            Mode::Active
        } else {
            Mode::Passive
        });
        stream
            .transfer_type(FileType::Binary)
            .map_err(map_transport_error)?;

        Ok(stream)
    }
}

impl RemoteBackend for FtpBackend {
    fn exists(&mut self, path: &str) -> Result<bool, FtpError> {
        if self.is_dir(path)? {
            return Ok(true);
        }
        match self.stream.size(path) {
            Ok(_) => Ok(true),
            Err(err) => match map_transport_error(err) {
                FtpError::FileUnavailable(_) | FtpError::InvalidPath(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    fn is_dir(&mut self, path: &str) -> Result<bool, FtpError> {
        match self.stream.cwd(path) {
            Ok(()) => {
                self.stream.cwd(&self.home).map_err(map_transport_error)?;
                Ok(true)
            }
            Err(err) => match map_transport_error(err) {
                FtpError::FileUnavailable(_) | FtpError::InvalidPath(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    fn list_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>, FtpError> {
        let names = self.stream.nlst(Some(path)).map_err(map_transport_error)?;
        let mut entries = Vec::with_capacity(names.len());
        for raw in names {
            // Servers answer NLST with bare names or full paths; keep the leaf.
            let name = match raw.rsplit('/').next() {
                Some(leaf) => leaf.to_string(),
                None => raw,
            };
            if name.is_empty() || name == "." || name == ".." {
                continue;
            }
            let full = join_remote_path(path, &name);
            let kind = if self.is_dir(&full)? {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(RemoteEntry { name, kind });
        }
        Ok(entries)
    }

    fn mtime(&mut self, path: &str) -> Result<i64, FtpError> {
        let modified = self.stream.mdtm(path).map_err(map_transport_error)?;
        Ok(modified.and_utc().timestamp())
    }

    fn size(&mut self, path: &str) -> Result<u64, FtpError> {
        let size = self.stream.size(path).map_err(map_transport_error)?;
        Ok(size as u64)
    }

    fn download(&mut self, path: &str) -> Result<Vec<u8>, FtpError> {
        let buffer = self
            .stream
            .retr_as_buffer(path)
            .map_err(map_transport_error)?;
        Ok(buffer.into_inner())
    }

    fn upload(&mut self, path: &str, data: &[u8]) -> Result<u64, FtpError> {
        self.stream
            .put_file(path, &mut Cursor::new(data))
            .map_err(map_transport_error)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), FtpError> {
        self.stream.mkdir(path).map_err(map_transport_error)
    }

    fn remove_file(&mut self, path: &str) -> Result<(), FtpError> {
        self.stream.rm(path).map_err(map_transport_error)
    }

    fn remove_dir(&mut self, path: &str) -> Result<(), FtpError> {
        self.stream.rmdir(path).map_err(map_transport_error)
    }

    fn reconnect(&mut self) -> Result<(), FtpError> {
        info!("reconnecting to {}", self.endpoint);
        let _ = self.stream.quit();
        self.stream = Self::open_stream(&self.endpoint, &self.settings)?;
        self.home = self.stream.pwd().map_err(map_transport_error)?;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), FtpError> {
        self.stream.quit().map_err(map_transport_error)
    }
}

fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr, FtpError> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| FtpError::ConnectionFailed(format!("no addresses resolved for {host}:{port}")))
}

fn map_transport_error(err: TransportError) -> FtpError {
    let message = err.to_string();
    match err {
        TransportError::ConnectionError(io) => FtpError::ConnectionFailed(io.to_string()),
        TransportError::UnexpectedResponse(response) => map_response_error(response.status, message),
        _ => FtpError::ProtocolError(message),
    }
}

fn map_response_error(status: Status, message: String) -> FtpError {
    match status {
        Status::NotLoggedIn | Status::InvalidCredentials => FtpError::AuthenticationFailed(message),
        Status::FileUnavailable => FtpError::FileUnavailable(message),
        Status::BadFilename => FtpError::InvalidPath(message),
        // 421: server is dropping the control connection.
        Status::NotAvailable => FtpError::ConnectionFailed(message),
        Status::CannotOpenDataConnection
        | Status::TransferAborted
        | Status::RequestFileActionIgnored
        | Status::ActionAborted => FtpError::TransferAborted(message),
        _ => FtpError::ProtocolError(message),
    }
}

fn map_login_error(err: TransportError) -> FtpError {
    match &err {
        TransportError::UnexpectedResponse(response)
            if matches!(
                response.status,
                Status::NotLoggedIn | Status::InvalidCredentials | Status::NeedPassword
            ) =>
        {
            FtpError::AuthenticationFailed(err.to_string())
        }
        _ => map_transport_error(err),
    }
}

/// Opens sessions for the pool. The seam lets tests (and alternative
/// transports) substitute the FTP handshake.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        endpoint: &EndpointKey,
        settings: &ProviderSettings,
    ) -> Result<SessionHandle, FtpError>;
}

/// Default connector: blocking FTP handshake on the blocking thread pool,
/// then a dedicated session owner thread.
pub struct FtpConnector;

#[async_trait]
impl Connector for FtpConnector {
    async fn connect(
        &self,
        endpoint: &EndpointKey,
        settings: &ProviderSettings,
    ) -> Result<SessionHandle, FtpError> {
        let endpoint_owned = endpoint.clone();
        let settings_owned = settings.clone();
        let backend =
            tokio::task::spawn_blocking(move || FtpBackend::connect(&endpoint_owned, &settings_owned))
                .await
                .map_err(|e| FtpError::ConnectionFailed(format!("connect task failed: {e}")))??;
        Ok(SessionHandle::spawn(backend, endpoint.to_string()))
    }
}
