//! Mailbox password resolution.
//!
//! A password can come from one of three places, checked in this order:
//!
//! 1. **Direct value** - local testing only (`passwordInsecure` in a config file)
//! 2. **File reference** - Docker secrets (`HELPEDGE_EMAIL_PASS_FILE=/run/secrets/imap`)
//! 3. **Env var reference** - the name of a variable that holds the password
//!
//! The env var is read at connect time, so the password itself never lives
//! in [`crate::config::IngestConfig`].

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Result type for secret resolution.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Where to find a secret. Empty strings count as "not configured".
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    /// Direct value. Insecure: it ends up in config files and process dumps.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "passwordInsecure",
        alias = "password"
    )]
    pub insecure_value: Option<String>,

    /// Path to a file whose trimmed contents are the secret.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "passwordFile")]
    pub file: Option<String>,

    /// Name of the environment variable holding the secret.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "passwordEnvVar")]
    pub env_var: Option<String>,
}

impl std::fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretSource")
            .field(
                "insecure_value",
                &self.insecure_value.as_ref().map(|_| "[REDACTED]"),
            )
            .field("file", &self.file)
            .field("env_var", &self.env_var)
            .finish()
    }
}

impl SecretSource {
    /// Source that reads the named environment variable.
    pub fn env(name: impl Into<String>) -> Self {
        Self {
            env_var: Some(name.into()),
            ..Self::default()
        }
    }

    /// Checks if at least one source is configured.
    pub fn is_configured(&self) -> bool {
        non_empty(self.insecure_value.as_deref()).is_some()
            || non_empty(self.file.as_deref()).is_some()
            || non_empty(self.env_var.as_deref()).is_some()
    }

    /// Resolves the secret from the first configured source.
    pub fn resolve(&self) -> Result<SecretString> {
        if let Some(value) = non_empty(self.insecure_value.as_deref()) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = non_empty(self.file.as_deref()) {
            let expanded = expand_home(path);
            return match std::fs::read_to_string(&expanded) {
                Ok(content) => Ok(SecretString::from(content.trim().to_string())),
                Err(e) => Err(SecretError::FileReadError {
                    path: expanded,
                    source: e,
                }),
            };
        }

        if let Some(name) = non_empty(self.env_var.as_deref()) {
            return match std::env::var(name) {
                // Env vars may carry a trailing newline.
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Expands `~` to the user's home directory. `~user/path` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            if path == "~" {
                return home.to_string_lossy().into_owned();
            }
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("HELPEDGE_TEST_SECRET", "from-env");
        let source = SecretSource {
            insecure_value: Some("direct".to_string()),
            file: None,
            env_var: Some("HELPEDGE_TEST_SECRET".to_string()),
        };
        assert_eq!(source.resolve().unwrap().expose_secret(), "direct");
        std::env::remove_var("HELPEDGE_TEST_SECRET");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imap-password");
        std::fs::write(&path, "from-file\n").unwrap();
        std::env::set_var("HELPEDGE_TEST_SECRET", "from-env");

        let source = SecretSource {
            insecure_value: Some(String::new()),
            file: Some(path.to_string_lossy().into_owned()),
            env_var: Some("HELPEDGE_TEST_SECRET".to_string()),
        };
        assert_eq!(source.resolve().unwrap().expose_secret(), "from-file");
        std::env::remove_var("HELPEDGE_TEST_SECRET");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback_is_trimmed() {
        std::env::set_var("HELPEDGE_TEST_SECRET", "hunter2\n");
        let source = SecretSource::env("HELPEDGE_TEST_SECRET");
        assert_eq!(source.resolve().unwrap().expose_secret(), "hunter2");
        std::env::remove_var("HELPEDGE_TEST_SECRET");
    }

    #[test]
    #[serial]
    fn test_env_var_not_set_error() {
        std::env::remove_var("HELPEDGE_TEST_SECRET_MISSING");
        let source = SecretSource::env("HELPEDGE_TEST_SECRET_MISSING");
        assert!(matches!(
            source.resolve(),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_no_source_error() {
        let source = SecretSource::default();
        assert!(!source.is_configured());
        assert!(matches!(
            source.resolve(),
            Err(SecretError::NoSourceProvided)
        ));
    }

    #[test]
    fn test_file_not_found_error() {
        let source = SecretSource {
            file: Some("/nonexistent/helpedge/secret".to_string()),
            ..SecretSource::default()
        };
        assert!(source.is_configured());
        assert!(matches!(
            source.resolve(),
            Err(SecretError::FileReadError { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_direct_value() {
        let source = SecretSource {
            insecure_value: Some("hunter2".to_string()),
            ..SecretSource::default()
        };
        let debug = format!("{:?}", source);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    #[serial]
    fn test_expand_home() {
        let original = std::env::var_os("HOME");
        std::env::set_var("HOME", "/home/agent");
        assert_eq!(expand_home("~/secret"), "/home/agent/secret");
        assert_eq!(expand_home("~"), "/home/agent");
        assert_eq!(expand_home("/etc/secret"), "/etc/secret");
        match original {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }
    }
}
