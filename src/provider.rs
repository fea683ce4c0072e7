//! Storage provider
//!
//! The entry point the host holds: owns the connection pool, validates query
//! strings, constructs storage objects, and declares its rate-limiting needs.

use std::sync::Arc;

use crate::config::ProviderSettings;
use crate::ftp::{ConnectionPool, Connector};
use crate::query::parse_query;
use crate::storage::{FtpStorageObject, StorageError};

/// Suggested per-endpoint request ceiling; enforcement is the host's job.
const DEFAULT_MAX_REQUESTS_PER_SECOND: f64 = 10.0;

/// Outcome of validating a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryValidation {
    pub valid: bool,
    /// User-facing reason when invalid.
    pub reason: Option<String>,
}

/// A documented example query.
#[derive(Debug, Clone, Copy)]
pub struct ExampleQuery {
    pub query: &'static str,
    pub description: &'static str,
}

pub struct FtpStorageProvider {
    settings: ProviderSettings,
    pool: Arc<ConnectionPool>,
}

impl FtpStorageProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        let pool = Arc::new(ConnectionPool::new(settings.clone()));
        Self { settings, pool }
    }

    /// Provider with a custom session connector.
    pub fn with_connector(settings: ProviderSettings, connector: Arc<dyn Connector>) -> Self {
        let pool = Arc::new(ConnectionPool::with_connector(settings.clone(), connector));
        Self { settings, pool }
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Build a storage object for a query, connecting its endpoint's session
    /// on first use. Objects for the same `(host, port, scheme)` share one
    /// session.
    pub async fn object(&self, query: &str) -> Result<FtpStorageObject, StorageError> {
        let parsed = parse_query(query)?;
        let session = self.pool.get(&parsed.endpoint).await?;
        Ok(FtpStorageObject::new(parsed, session))
    }

    /// Check a query string without touching the network. Queries containing
    /// wildcard placeholders are valid; the host resolves them before
    /// retrieval.
    pub fn validate_query(query: &str) -> QueryValidation {
        match parse_query(query) {
            Ok(_) => QueryValidation {
                valid: true,
                reason: None,
            },
            Err(err) => QueryValidation {
                valid: false,
                reason: Some(err.to_string()),
            },
        }
    }

    /// This provider wants per-endpoint request throttling.
    pub fn use_rate_limiter(&self) -> bool {
        true
    }

    /// Suggested request ceiling per throttling key.
    pub fn default_max_requests_per_second(&self) -> f64 {
        DEFAULT_MAX_REQUESTS_PER_SECOND
    }

    /// Throttling key for a query: the endpoint's network location.
    pub fn rate_limiter_key(&self, query: &str) -> Option<String> {
        parse_query(query).ok().map(|parsed| parsed.endpoint.netloc())
    }

    pub fn example_queries() -> Vec<ExampleQuery> {
        vec![
            ExampleQuery {
                query: "ftp://ftpserver.com:21/myfile.txt",
                description: "A file on an FTP server. The port is optional and defaults to 21.",
            },
            ExampleQuery {
                query: "ftps://ftpserver.com:21/myfile.txt",
                description: "A file on an FTP server using encrypted transport. \
                              The port is optional and defaults to 21.",
            },
        ]
    }

    /// Close every pooled session.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::ftp::backend::testing::MemoryBackend;
    use crate::ftp::{FtpError, SessionHandle};
    use crate::query::EndpointKey;

    struct MemoryConnector;

    #[async_trait]
    impl Connector for MemoryConnector {
        async fn connect(
            &self,
            endpoint: &EndpointKey,
            _settings: &ProviderSettings,
        ) -> Result<SessionHandle, FtpError> {
            Ok(SessionHandle::spawn(MemoryBackend::new(), endpoint.to_string()))
        }
    }

    fn provider() -> FtpStorageProvider {
        FtpStorageProvider::with_connector(ProviderSettings::default(), Arc::new(MemoryConnector))
    }

    #[test]
    fn test_validate_query() {
        assert!(FtpStorageProvider::validate_query("ftp://host/f").valid);
        assert!(FtpStorageProvider::validate_query("ftps://host/data/{sample}.txt").valid);

        let invalid = FtpStorageProvider::validate_query("s3://bucket/key");
        assert!(!invalid.valid);
        assert!(!invalid.reason.unwrap().is_empty());

        let invalid = FtpStorageProvider::validate_query("ftp://host");
        assert!(!invalid.valid);
        assert!(invalid.reason.unwrap().contains("path"));
    }

    #[test]
    fn test_rate_limiter_surface() {
        let provider = provider();
        assert!(provider.use_rate_limiter());
        assert_eq!(provider.default_max_requests_per_second(), 10.0);
        assert_eq!(
            provider.rate_limiter_key("ftp://host:2121/data/f"),
            Some("host:2121".to_string())
        );
        assert_eq!(provider.rate_limiter_key("not a query"), None);
    }

    #[test]
    fn test_example_queries_are_valid() {
        for example in FtpStorageProvider::example_queries() {
            assert!(FtpStorageProvider::validate_query(example.query).valid);
            assert!(!example.description.is_empty());
        }
    }

    #[tokio::test]
    async fn test_objects_share_sessions_per_endpoint() {
        let provider = provider();

        let a = provider.object("ftp://host/data/a.txt").await.unwrap();
        let b = provider.object("ftp://host/data/b.txt").await.unwrap();
        let other = provider.object("ftp://other-host/data/a.txt").await.unwrap();

        assert!(a.session().same_session(b.session()));
        assert!(!a.session().same_session(other.session()));
    }

    #[tokio::test]
    async fn test_object_rejects_invalid_query() {
        let provider = provider();
        let err = provider.object("gopher://host/f").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidQuery(_)));
    }
}
