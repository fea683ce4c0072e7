//! Connection pool
//!
//! Process-wide map from endpoint identity to an open, authenticated session:
//! creates on miss, reuses on hit. The pool has an explicit lifecycle: the
//! provider constructs it and injects handles into storage objects, rather
//! than living in ambient global state.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::backend::{Connector, FtpConnector};
use super::error::FtpError;
use super::session::SessionHandle;
use crate::config::ProviderSettings;
use crate::query::EndpointKey;

pub struct ConnectionPool {
    settings: ProviderSettings,
    connector: Arc<dyn Connector>,
    /// Per-key cells: the `OnceCell` serializes concurrent first use so one
    /// key handshakes exactly once. A failed handshake leaves the cell empty,
    /// so a later call gets another chance.
    sessions: DashMap<EndpointKey, Arc<OnceCell<SessionHandle>>>,
}

impl ConnectionPool {
    pub fn new(settings: ProviderSettings) -> Self {
        Self::with_connector(settings, Arc::new(FtpConnector))
    }

    /// Pool with a custom session connector.
    pub fn with_connector(settings: ProviderSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            settings,
            connector,
            sessions: DashMap::new(),
        }
    }

    /// The session for an endpoint, connecting and authenticating on first
    /// use. Every call with an equal key returns a handle to the same session
    /// until [`shutdown`](Self::shutdown).
    ///
    /// Liveness of a cached session is not validated here; a dropped link is
    /// repaired by the session owner when the retried operation reaches it.
    pub async fn get(&self, endpoint: &EndpointKey) -> Result<SessionHandle, FtpError> {
        let cell = self
            .sessions
            .entry(endpoint.clone())
            .or_default()
            .value()
            .clone();

        let handle = cell
            .get_or_try_init(|| async {
                info!("opening session for {}", endpoint);
                self.connector.connect(endpoint, &self.settings).await
            })
            .await?;

        debug!("session handle issued for {}", endpoint);
        Ok(handle.clone())
    }

    /// Number of established sessions.
    pub fn session_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    /// Close every pooled session. Called at provider shutdown; sessions are
    /// never reaped earlier.
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .filter_map(|entry| entry.value().get().cloned())
            .collect();

        info!("closing {} pooled sessions", handles.len());
        for handle in handles {
            handle.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::ftp::backend::testing::MemoryBackend;
    use crate::query::{parse_query, Protocol};

    struct CountingConnector {
        connects: AtomicUsize,
        fail_first: AtomicUsize,
    }

    impl CountingConnector {
        fn new() -> Self {
            Self {
                connects: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(0),
            }
        }

        fn failing_first(n: usize) -> Self {
            Self {
                connects: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(n),
            }
        }
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(
            &self,
            endpoint: &EndpointKey,
            _settings: &ProviderSettings,
        ) -> Result<SessionHandle, FtpError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            // Widen the race window for the concurrent-first-use test.
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(FtpError::ConnectionFailed("injected".to_string()));
            }
            Ok(SessionHandle::spawn(MemoryBackend::new(), endpoint.to_string()))
        }
    }

    fn endpoint(query: &str) -> EndpointKey {
        parse_query(query).unwrap().endpoint
    }

    #[tokio::test]
    async fn test_same_key_reuses_the_session() {
        let connector = Arc::new(CountingConnector::new());
        let pool = ConnectionPool::with_connector(ProviderSettings::default(), connector.clone());

        let key = endpoint("ftp://host:2121/a");
        let first = pool.get(&key).await.unwrap();
        let second = pool.get(&endpoint("ftp://HOST:2121/other")).await.unwrap();

        assert!(first.same_session(&second));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(pool.session_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_get_distinct_sessions() {
        let connector = Arc::new(CountingConnector::new());
        let pool = ConnectionPool::with_connector(ProviderSettings::default(), connector.clone());

        let plain = pool.get(&endpoint("ftp://host/a")).await.unwrap();
        let secure = pool.get(&endpoint("ftps://host/a")).await.unwrap();
        let other_port = pool.get(&endpoint("ftp://host:2121/a")).await.unwrap();

        assert!(!plain.same_session(&secure));
        assert!(!plain.same_session(&other_port));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
        assert_eq!(pool.session_count(), 3);

        let key = endpoint("ftp://host/a");
        assert_eq!(key.protocol, Protocol::Plain);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_connects_once() {
        let connector = Arc::new(CountingConnector::new());
        let pool = Arc::new(ConnectionPool::with_connector(
            ProviderSettings::default(),
            connector.clone(),
        ));

        let key = endpoint("ftp://host/a");
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let key = key.clone();
            tasks.push(tokio::spawn(async move { pool.get(&key).await.unwrap() }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        for pair in handles.windows(2) {
            assert!(pair[0].same_session(&pair[1]));
        }
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried_on_next_get() {
        let connector = Arc::new(CountingConnector::failing_first(1));
        let pool = ConnectionPool::with_connector(ProviderSettings::default(), connector.clone());

        let key = endpoint("ftp://host/a");
        assert!(pool.get(&key).await.is_err());
        assert_eq!(pool.session_count(), 0);

        let handle = pool.get(&key).await.unwrap();
        assert!(handle.is_connected());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_sessions() {
        let connector = Arc::new(CountingConnector::new());
        let pool = ConnectionPool::with_connector(ProviderSettings::default(), connector);

        let handle = pool.get(&endpoint("ftp://host/a")).await.unwrap();
        pool.shutdown().await;

        assert!(matches!(
            handle.exists("/").await.unwrap_err(),
            FtpError::Disconnected
        ));
    }
}
