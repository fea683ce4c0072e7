//! Remote operation retry logic
//!
//! Provides bounded retry with exponential backoff for remote operations.
//! Every network-crossing storage operation goes through [`with_retry`];
//! query parsing and pool lookups do not.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::ftp::FtpError;
use crate::storage::StorageError;

/// Retry policy for remote operations.
///
/// The defaults are fixed policy constants so that every operation behaves the
/// same way; they are not part of the public storage-object API.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first failure.
    pub max_retries: usize,

    /// Initial backoff duration.
    pub initial_backoff: Duration,

    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,

    /// Upper bound on a single backoff delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Backoff delay before retry number `attempt` (zero-based, exponential).
pub fn backoff_delay(attempt: usize, policy: &RetryPolicy) -> Duration {
    let secs = (policy.initial_backoff.as_secs_f64()
        * policy.backoff_multiplier.powi(attempt as i32))
    .min(policy.max_backoff.as_secs_f64());
    Duration::from_secs_f64(secs)
}

/// Whether an error is worth retrying.
///
/// Transient: the connection-shaped failures. Permanent: everything the server
/// or the local filesystem decided on purpose (auth, missing paths, bad names,
/// local I/O), which would fail identically on every attempt.
pub fn is_transient(error: &StorageError) -> bool {
    match error {
        StorageError::Remote(remote) => match remote {
            FtpError::ConnectionFailed(_)
            | FtpError::Timeout(_)
            | FtpError::TransferAborted(_)
            | FtpError::IoError(_)
            | FtpError::Disconnected => true,
            FtpError::ProtocolError(msg) => msg.contains("timeout") || msg.contains("connection"),
            _ => false,
        },
        _ => false,
    }
}

/// Execute a remote operation with automatic retry on transient failure.
///
/// Permanent failures are re-raised immediately without consuming retry
/// budget. When the budget runs out, the last failure is wrapped in
/// [`StorageError::RetriesExhausted`] rather than swallowed.
pub async fn with_retry<T, F, Fut>(op: &str, policy: &RetryPolicy, f: F) -> Result<T, StorageError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut failures = 0usize;
    loop {
        match f().await {
            Ok(value) => {
                if failures > 0 {
                    debug!("{} succeeded on attempt {}", op, failures + 1);
                }
                return Ok(value);
            }
            Err(err) if !is_transient(&err) => {
                warn!("{} failed with non-retryable error: {}", op, err);
                return Err(err);
            }
            Err(err) => {
                failures += 1;
                if failures > policy.max_retries {
                    warn!("{} failed after {} attempts: {}", op, failures, err);
                    return Err(StorageError::RetriesExhausted {
                        op: op.to_string(),
                        attempts: failures,
                        source: Box::new(err),
                    });
                }
                let delay = backoff_delay(failures - 1, policy);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    op,
                    failures,
                    policy.max_retries + 1,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Zero-delay policy so retry tests run instantly.
#[cfg(test)]
pub(crate) fn immediate_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_backoff: Duration::ZERO,
        backoff_multiplier: 1.0,
        max_backoff: Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn transient() -> StorageError {
        StorageError::Remote(FtpError::ConnectionFailed("connection reset".to_string()))
    }

    fn permanent() -> StorageError {
        StorageError::Remote(FtpError::FileUnavailable("/missing".to_string()))
    }

    #[test]
    fn test_backoff_delay() {
        let policy = RetryPolicy::default();

        assert_eq!(backoff_delay(0, &policy).as_secs(), 1);
        assert_eq!(backoff_delay(1, &policy).as_secs(), 2);
        assert_eq!(backoff_delay(2, &policy).as_secs(), 4);
        // Capped at max_backoff.
        assert_eq!(backoff_delay(10, &policy).as_secs(), 30);
    }

    #[test]
    fn test_backoff_delay_custom_policy() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_secs(2),
            backoff_multiplier: 3.0,
            max_backoff: Duration::from_secs(60),
        };

        assert_eq!(backoff_delay(0, &policy).as_secs(), 2);
        assert_eq!(backoff_delay(1, &policy).as_secs(), 6);
        assert_eq!(backoff_delay(2, &policy).as_secs(), 18);
    }

    #[test]
    fn test_is_transient() {
        assert!(is_transient(&transient()));
        assert!(is_transient(&StorageError::Remote(FtpError::Timeout("30s".into()))));
        assert!(is_transient(&StorageError::Remote(FtpError::TransferAborted(
            "426".into()
        ))));
        assert!(is_transient(&StorageError::Remote(FtpError::ProtocolError(
            "control connection closed".into()
        ))));

        assert!(!is_transient(&permanent()));
        assert!(!is_transient(&StorageError::Remote(
            FtpError::AuthenticationFailed("530".into())
        )));
        // Local filesystem failures are not a network condition.
        assert!(!is_transient(&StorageError::Local(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied"
        ))));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = {
            let calls = calls.clone();
            with_retry("op", &immediate_policy(), move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, StorageError>(42u64)
                }
            })
            .await
        };

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = {
            let calls = calls.clone();
            with_retry("op", &immediate_policy(), move || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transient())
                    } else {
                        Ok(7u64)
                    }
                }
            })
            .await
        };

        assert_eq!(result.unwrap(), 7);
        // Two failures plus the success.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = {
            let calls = calls.clone();
            with_retry("op", &immediate_policy(), move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u64, _>(permanent())
                }
            })
            .await
        };

        assert!(matches!(
            result.unwrap_err(),
            StorageError::Remote(FtpError::FileUnavailable(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_typed_error_with_attempt_count() {
        let policy = immediate_policy();
        let calls = Arc::new(AtomicUsize::new(0));
        let result = {
            let calls = calls.clone();
            with_retry("download", &policy, move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u64, _>(transient())
                }
            })
            .await
        };

        match result.unwrap_err() {
            StorageError::RetriesExhausted { op, attempts, source } => {
                assert_eq!(op, "download");
                assert_eq!(attempts, policy.max_retries + 1);
                assert!(matches!(
                    *source,
                    StorageError::Remote(FtpError::ConnectionFailed(_))
                ));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), policy.max_retries + 1);
    }
}
