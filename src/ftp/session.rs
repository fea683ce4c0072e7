//! FTP session owner
//!
//! This module implements the "single owner" pattern for a pooled session.
//!
//! # Architecture
//!
//! Only one thread owns the blocking FTP stream. All other components
//! communicate with it via [`SessionHandle`], which sends commands through an
//! mpsc channel and receives replies on oneshot channels.
//!
//! This avoids:
//! - `Arc<Mutex<...>>` lock contention around a blocking protocol client
//! - Holding locks across `.await`
//! - Interleaved commands on a single-command-in-flight protocol
//!
//! FTP allows one command at a time per control connection, so funneling every
//! caller through the owner thread is also what serializes concurrent storage
//! operations that share a pooled session.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::backend::RemoteBackend;
use super::error::FtpError;
use crate::storage::types::RemoteEntry;

/// Commands sent to the session owner thread.
pub enum SessionCommand {
    Exists {
        path: String,
        reply_tx: oneshot::Sender<Result<bool, FtpError>>,
    },
    IsDir {
        path: String,
        reply_tx: oneshot::Sender<Result<bool, FtpError>>,
    },
    ListDir {
        path: String,
        reply_tx: oneshot::Sender<Result<Vec<RemoteEntry>, FtpError>>,
    },
    Mtime {
        path: String,
        reply_tx: oneshot::Sender<Result<i64, FtpError>>,
    },
    Size {
        path: String,
        reply_tx: oneshot::Sender<Result<u64, FtpError>>,
    },
    Download {
        path: String,
        reply_tx: oneshot::Sender<Result<Vec<u8>, FtpError>>,
    },
    Upload {
        path: String,
        data: Vec<u8>,
        reply_tx: oneshot::Sender<Result<u64, FtpError>>,
    },
    Mkdir {
        path: String,
        reply_tx: oneshot::Sender<Result<(), FtpError>>,
    },
    RemoveFile {
        path: String,
        reply_tx: oneshot::Sender<Result<(), FtpError>>,
    },
    RemoveDir {
        path: String,
        reply_tx: oneshot::Sender<Result<(), FtpError>>,
    },
    Quit,
}

/// Cloneable handle to a pooled session.
///
/// Every storage object whose query maps to the same endpoint holds a clone of
/// the same handle; clones address the same owner thread, never a new
/// connection.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Spawn a session owner thread for `backend` and return its handle.
    pub fn spawn<B>(backend: B, label: String) -> Self
    where
        B: RemoteBackend + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let owner_label = label.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("ftp-session-{label}"))
            .spawn(move || session_owner_loop(backend, cmd_rx, owner_label));
        if let Err(err) = spawned {
            // The dropped receiver makes every request answer `Disconnected`.
            warn!("failed to spawn session owner thread for {label}: {err}");
        }
        Self { cmd_tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, FtpError>>) -> SessionCommand,
    ) -> Result<T, FtpError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| FtpError::Disconnected)?;
        reply_rx.await.map_err(|_| FtpError::Disconnected)?
    }

    pub async fn exists(&self, path: &str) -> Result<bool, FtpError> {
        let path = path.to_string();
        self.request(|reply_tx| SessionCommand::Exists { path, reply_tx })
            .await
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool, FtpError> {
        let path = path.to_string();
        self.request(|reply_tx| SessionCommand::IsDir { path, reply_tx })
            .await
    }

    pub async fn list_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, FtpError> {
        let path = path.to_string();
        self.request(|reply_tx| SessionCommand::ListDir { path, reply_tx })
            .await
    }

    pub async fn mtime(&self, path: &str) -> Result<i64, FtpError> {
        let path = path.to_string();
        self.request(|reply_tx| SessionCommand::Mtime { path, reply_tx })
            .await
    }

    pub async fn size(&self, path: &str) -> Result<u64, FtpError> {
        let path = path.to_string();
        self.request(|reply_tx| SessionCommand::Size { path, reply_tx })
            .await
    }

    pub async fn download(&self, path: &str) -> Result<Vec<u8>, FtpError> {
        let path = path.to_string();
        self.request(|reply_tx| SessionCommand::Download { path, reply_tx })
            .await
    }

    pub async fn upload(&self, path: &str, data: Vec<u8>) -> Result<u64, FtpError> {
        let path = path.to_string();
        self.request(|reply_tx| SessionCommand::Upload { path, data, reply_tx })
            .await
    }

    pub async fn mkdir(&self, path: &str) -> Result<(), FtpError> {
        let path = path.to_string();
        self.request(|reply_tx| SessionCommand::Mkdir { path, reply_tx })
            .await
    }

    pub async fn remove_file(&self, path: &str) -> Result<(), FtpError> {
        let path = path.to_string();
        self.request(|reply_tx| SessionCommand::RemoveFile { path, reply_tx })
            .await
    }

    pub async fn remove_dir(&self, path: &str) -> Result<(), FtpError> {
        let path = path.to_string();
        self.request(|reply_tx| SessionCommand::RemoveDir { path, reply_tx })
            .await
    }

    /// Ask the owner thread to close the session and exit.
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Quit).await;
    }

    /// Whether the owner thread is still accepting commands.
    pub fn is_connected(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Whether two handles address the same pooled session.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        self.cmd_tx.same_channel(&other.cmd_tx)
    }
}

/// Owner loop: consumes commands until `Quit` or all handles drop.
///
/// After a connection-class failure the link is marked broken and the backend
/// re-handshakes before serving the next command, so a retried operation can
/// succeed once the server is reachable again.
fn session_owner_loop<B: RemoteBackend>(
    mut backend: B,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    label: String,
) {
    info!("session owner started for {label}");
    let mut link_broken = false;

    while let Some(cmd) = cmd_rx.blocking_recv() {
        if matches!(cmd, SessionCommand::Quit) {
            info!("quit requested for {label}");
            break;
        }
        if link_broken {
            if let Err(err) = backend.reconnect() {
                warn!("reconnect to {label} failed: {err}");
                reply_with_error(cmd, err);
                continue;
            }
            link_broken = false;
        }
        link_broken = dispatch(&mut backend, cmd);
    }

    drain_pending_commands(&mut cmd_rx);
    if let Err(err) = backend.quit() {
        debug!("quit for {label} returned error: {err}");
    }
    info!("session owner terminated for {label}");
}

/// Run one command; returns true if the failure was connection-class.
fn dispatch<B: RemoteBackend>(backend: &mut B, cmd: SessionCommand) -> bool {
    match cmd {
        SessionCommand::Exists { path, reply_tx } => send_reply(reply_tx, backend.exists(&path)),
        SessionCommand::IsDir { path, reply_tx } => send_reply(reply_tx, backend.is_dir(&path)),
        SessionCommand::ListDir { path, reply_tx } => send_reply(reply_tx, backend.list_dir(&path)),
        SessionCommand::Mtime { path, reply_tx } => send_reply(reply_tx, backend.mtime(&path)),
        SessionCommand::Size { path, reply_tx } => send_reply(reply_tx, backend.size(&path)),
        SessionCommand::Download { path, reply_tx } => send_reply(reply_tx, backend.download(&path)),
        SessionCommand::Upload {
            path,
            data,
            reply_tx,
        } => send_reply(reply_tx, backend.upload(&path, &data)),
        SessionCommand::Mkdir { path, reply_tx } => send_reply(reply_tx, backend.mkdir(&path)),
        SessionCommand::RemoveFile { path, reply_tx } => {
            send_reply(reply_tx, backend.remove_file(&path))
        }
        SessionCommand::RemoveDir { path, reply_tx } => {
            send_reply(reply_tx, backend.remove_dir(&path))
        }
        // Handled by the owner loop before dispatch.
        SessionCommand::Quit => false,
    }
}

fn send_reply<T>(reply_tx: oneshot::Sender<Result<T, FtpError>>, result: Result<T, FtpError>) -> bool {
    let broken = result
        .as_ref()
        .err()
        .is_some_and(FtpError::is_connection_error);
    if reply_tx.send(result).is_err() {
        warn!("caller dropped before receiving session reply");
    }
    broken
}

/// Answer a single command with `err` instead of running it.
fn reply_with_error(cmd: SessionCommand, err: FtpError) {
    match cmd {
        SessionCommand::Exists { reply_tx, .. } => drop(reply_tx.send(Err(err))),
        SessionCommand::IsDir { reply_tx, .. } => drop(reply_tx.send(Err(err))),
        SessionCommand::ListDir { reply_tx, .. } => drop(reply_tx.send(Err(err))),
        SessionCommand::Mtime { reply_tx, .. } => drop(reply_tx.send(Err(err))),
        SessionCommand::Size { reply_tx, .. } => drop(reply_tx.send(Err(err))),
        SessionCommand::Download { reply_tx, .. } => drop(reply_tx.send(Err(err))),
        SessionCommand::Upload { reply_tx, .. } => drop(reply_tx.send(Err(err))),
        SessionCommand::Mkdir { reply_tx, .. } => drop(reply_tx.send(Err(err))),
        SessionCommand::RemoveFile { reply_tx, .. } => drop(reply_tx.send(Err(err))),
        SessionCommand::RemoveDir { reply_tx, .. } => drop(reply_tx.send(Err(err))),
        SessionCommand::Quit => {}
    }
}

/// Drain commands queued behind a shutdown, answering `Disconnected` to each.
fn drain_pending_commands(cmd_rx: &mut mpsc::Receiver<SessionCommand>) {
    cmd_rx.close();
    while let Ok(cmd) = cmd_rx.try_recv() {
        reply_with_error(cmd, FtpError::Disconnected);
    }
}
