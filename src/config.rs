//! Provider settings
//!
//! Credentials and transfer-mode configuration, shared by every session the
//! pool opens. Loaded by the host from whatever config source it owns; the
//! env-var path mirrors the `FTPSTORE_*` variables for headless use.

use serde::{Deserialize, Serialize};

/// Username used when no credentials are configured.
const ANONYMOUS_USERNAME: &str = "anonymous";

/// Conventional password for anonymous logins.
const ANONYMOUS_PASSWORD: &str = "anonymous@";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// FTP username; anonymous access when unset.
    pub username: Option<String>,

    /// FTP password; anonymous access when unset.
    pub password: Option<String>,

    /// Use active transfer mode instead of passive.
    pub active_mode: bool,
}

impl ProviderSettings {
    /// Settings from `FTPSTORE_USERNAME`, `FTPSTORE_PASSWORD`, and
    /// `FTPSTORE_ACTIVE_MODE` (truthy values: `1`, `true`, `yes`).
    pub fn from_env() -> Self {
        Self {
            username: env_string("FTPSTORE_USERNAME"),
            password: env_string("FTPSTORE_PASSWORD"),
            active_mode: std::env::var("FTPSTORE_ACTIVE_MODE")
                .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    /// Username to log in with, falling back to anonymous access.
    pub fn effective_username(&self) -> &str {
        self.username.as_deref().unwrap_or(ANONYMOUS_USERNAME)
    }

    /// Password to log in with, falling back to anonymous access.
    pub fn effective_password(&self) -> &str {
        self.password.as_deref().unwrap_or(ANONYMOUS_PASSWORD)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_anonymous_passive() {
        let settings = ProviderSettings::default();
        assert_eq!(settings.effective_username(), "anonymous");
        assert_eq!(settings.effective_password(), "anonymous@");
        assert!(!settings.active_mode);
    }

    #[test]
    fn test_explicit_credentials_win() {
        let settings = ProviderSettings {
            username: Some("alice".to_string()),
            password: Some("hunter2".to_string()),
            active_mode: true,
        };
        assert_eq!(settings.effective_username(), "alice");
        assert_eq!(settings.effective_password(), "hunter2");
    }

    #[test]
    fn test_serde_defaults() {
        let settings: ProviderSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.username.is_none());
        assert!(!settings.active_mode);

        let settings: ProviderSettings =
            serde_json::from_str(r#"{"username":"bob","active_mode":true}"#).unwrap();
        assert_eq!(settings.username.as_deref(), Some("bob"));
        assert!(settings.active_mode);
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("FTPSTORE_USERNAME", "envuser");
        std::env::set_var("FTPSTORE_ACTIVE_MODE", "true");

        let settings = ProviderSettings::from_env();
        assert_eq!(settings.username.as_deref(), Some("envuser"));
        assert!(settings.password.is_none());
        assert!(settings.active_mode);

        std::env::remove_var("FTPSTORE_USERNAME");
        std::env::remove_var("FTPSTORE_ACTIVE_MODE");
    }
}
