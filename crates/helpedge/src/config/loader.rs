use std::path::{Path, PathBuf};

use crate::config::schema::{IngestConfig, ImapTimeouts, MailboxConfig};
use crate::error::ConfigError;
use crate::secrets::SecretSource;

pub const ENV_HOST: &str = "HELPEDGE_EMAIL_HOST";
pub const ENV_PORT: &str = "HELPEDGE_EMAIL_PORT";
pub const ENV_USER: &str = "HELPEDGE_EMAIL_USER";
pub const ENV_PASS: &str = "HELPEDGE_EMAIL_PASS";
pub const ENV_PASS_FILE: &str = "HELPEDGE_EMAIL_PASS_FILE";
pub const ENV_FOLDER: &str = "HELPEDGE_EMAIL_FOLDER";
pub const ENV_ACCEPT_INVALID_CERTS: &str = "HELPEDGE_TLS_ACCEPT_INVALID_CERTS";
pub const ENV_POLL_INTERVAL: &str = "HELPEDGE_POLL_INTERVAL_SECS";
pub const ENV_MAX_RUN: &str = "HELPEDGE_MAX_RUN_SECS";
pub const ENV_DATABASE_PATH: &str = "HELPEDGE_DATABASE_PATH";
pub const ENV_SYSTEM_USER_ID: &str = "HELPEDGE_SYSTEM_USER_ID";
pub const ENV_DEDUPE_MESSAGE_ID: &str = "HELPEDGE_DEDUPE_MESSAGE_ID";

/// Unprefixed names used by older deployments.
const LEGACY_HOST: &str = "EMAIL_HOST";
const LEGACY_USER: &str = "EMAIL_USER";
const LEGACY_PASS: &str = "EMAIL_PASS";

/// Reads a JSON config file and applies environment overrides on top.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<IngestConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config: IngestConfig = serde_json::from_str(&content)?;
    apply_overrides(&mut config, &env_lookup)?;
    validate_config(&config)?;
    Ok(config)
}

/// Parses a JSON config without consulting the environment.
pub fn load_config_from_str(content: &str) -> Result<IngestConfig, ConfigError> {
    let config: IngestConfig = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Builds the config purely from environment variables.
pub fn load_config_from_env() -> Result<IngestConfig, ConfigError> {
    load_config_from_lookup(&env_lookup)
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Builds the config from an arbitrary key lookup (the environment in
/// production, a map in tests).
pub fn load_config_from_lookup<F>(lookup: &F) -> Result<IngestConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = first_of(lookup, &[ENV_HOST, LEGACY_HOST]).ok_or(ConfigError::Missing(ENV_HOST))?;
    let username =
        first_of(lookup, &[ENV_USER, LEGACY_USER]).ok_or(ConfigError::Missing(ENV_USER))?;

    let mut config = IngestConfig {
        mailbox: MailboxConfig {
            host,
            port: 993,
            use_tls: true,
            username,
            password: SecretSource::default(),
            folder: "INBOX".to_string(),
            accept_invalid_certs: false,
            timeouts: ImapTimeouts::default(),
        },
        poll_interval: 300,
        max_run_duration: 240,
        database_path: None,
        system_user_id: "system".to_string(),
        dedupe_by_message_id: false,
    };

    apply_overrides(&mut config, lookup)?;
    validate_config(&config)?;
    Ok(config)
}

fn first_of<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter().find_map(|&k| lookup(k)).map(|v| v.trim().to_string())
}

fn apply_overrides<F>(config: &mut IngestConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = first_of(lookup, &[ENV_HOST, LEGACY_HOST]) {
        config.mailbox.host = host;
    }
    if let Some(user) = first_of(lookup, &[ENV_USER, LEGACY_USER]) {
        config.mailbox.username = user;
    }
    if let Some(port) = lookup(ENV_PORT) {
        config.mailbox.port = parse_number(ENV_PORT, &port)?;
    }
    if let Some(folder) = lookup(ENV_FOLDER) {
        config.mailbox.folder = folder.trim().to_string();
    }
    if let Some(flag) = lookup(ENV_ACCEPT_INVALID_CERTS) {
        config.mailbox.accept_invalid_certs = parse_bool(ENV_ACCEPT_INVALID_CERTS, &flag)?;
    }

    // The password stays in the environment; only its location is recorded.
    if let Some(file) = lookup(ENV_PASS_FILE) {
        config.mailbox.password = SecretSource {
            file: Some(file.trim().to_string()),
            ..SecretSource::default()
        };
    } else if lookup(ENV_PASS).is_some() {
        config.mailbox.password = SecretSource::env(ENV_PASS);
    } else if lookup(LEGACY_PASS).is_some() && !config.mailbox.password.is_configured() {
        config.mailbox.password = SecretSource::env(LEGACY_PASS);
    }

    if let Some(secs) = lookup(ENV_POLL_INTERVAL) {
        config.poll_interval = parse_number(ENV_POLL_INTERVAL, &secs)?;
    }
    if let Some(secs) = lookup(ENV_MAX_RUN) {
        config.max_run_duration = parse_number(ENV_MAX_RUN, &secs)?;
    }
    if let Some(path) = lookup(ENV_DATABASE_PATH) {
        config.database_path = Some(PathBuf::from(path.trim()));
    }
    if let Some(id) = lookup(ENV_SYSTEM_USER_ID) {
        config.system_user_id = id.trim().to_string();
    }
    if let Some(flag) = lookup(ENV_DEDUPE_MESSAGE_ID) {
        config.dedupe_by_message_id = parse_bool(ENV_DEDUPE_MESSAGE_ID, &flag)?;
    }
    Ok(())
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected true/false".to_string(),
        }),
    }
}

fn validate_config(config: &IngestConfig) -> Result<(), ConfigError> {
    let mailbox = &config.mailbox;

    if mailbox.host.trim().is_empty() {
        return Err(ConfigError::Missing(ENV_HOST));
    }
    if mailbox.username.trim().is_empty() {
        return Err(ConfigError::Missing(ENV_USER));
    }
    if !mailbox.password.is_configured() {
        return Err(ConfigError::Missing(ENV_PASS));
    }
    if !mailbox.use_tls {
        return Err(ConfigError::Validation {
            message: "TLS is required for mailbox connections".to_string(),
        });
    }
    if mailbox.port == 0 {
        return Err(ConfigError::Validation {
            message: "mailbox port must be non-zero".to_string(),
        });
    }
    if mailbox.folder.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "mailbox folder must not be empty".to_string(),
        });
    }
    if config.poll_interval == 0 {
        return Err(ConfigError::Validation {
            message: "poll interval must be at least one second".to_string(),
        });
    }
    if config.max_run_duration == 0 {
        return Err(ConfigError::Validation {
            message: "max run duration must be at least one second".to_string(),
        });
    }
    if config.system_user_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "system user id must not be empty".to_string(),
        });
    }

    if config.max_run_duration > config.poll_interval {
        tracing::warn!(
            max_run_secs = config.max_run_duration,
            poll_interval_secs = config.poll_interval,
            "Run budget exceeds the poll interval, a slow run delays the next one"
        );
    }
    if mailbox.accept_invalid_certs {
        tracing::warn!(
            host = %mailbox.host,
            "TLS certificate validation is DISABLED for the mailbox connection"
        );
    }

    Ok(())
}
