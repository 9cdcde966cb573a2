//! Configuration management
//!
//! Built once at startup from the environment (and an optional `.env`) and
//! then shared with the driver. Nothing in the worker reads the environment
//! after this point.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::http::HttpTimeouts;
use crate::store::{ftp::FtpConfig, SluicePaths};
use crate::trigger::TriggerGate;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default location of the configured-users file.
pub const DEFAULT_USERS_FILE: &str = "/config.json";

/// Default remote store port.
pub const DEFAULT_STORE_PORT: u16 = 21;

/// Default location of the remote store login secret.
pub const DEFAULT_SECRET_FILE: &str = "/var/run/secrets/sluice/password";

/// Default location of the CA certificates trusted for the remote store.
pub const DEFAULT_CA_FILE: &str = "/var/run/secrets/sluice/ca.pem";

/// Default inbound subdirectory.
pub const DEFAULT_INBOUND_DIR: &str = "inbound";

/// Default outbound subdirectory.
pub const DEFAULT_OUTBOUND_DIR: &str = "outbound";

/// Default HTTP connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1_000;

/// Default HTTP response timeout in milliseconds.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 5_000;

/// Default trigger schedule.
pub const DEFAULT_TRIGGER_SCHEDULE: &str = "daily@14";

/// One remote-store identity, processed independently each run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfiguredUser {
    #[serde(rename = "bruker")]
    pub username: String,
}

impl ConfiguredUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Client-credentials grant parameters
#[derive(Clone)]
pub struct CredentialConfig {
    pub token_url: String,
    pub client_id: String,
    pub scope: String,
    pub client_secret: String,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub users: Vec<ConfiguredUser>,
    pub store: FtpConfig,
    pub paths: SluicePaths,
    pub data_service_url: String,
    pub credentials: CredentialConfig,
    pub http: HttpTimeouts,
    /// Run a single batch and exit instead of staying resident
    pub run_as_job: bool,
    pub trigger: TriggerGate,
}

impl Config {
    /// Load configuration from `.env`, the process environment and the users file
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build configuration from a set of variables
    pub fn from_vars(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        let users_file = vars
            .get("SLUICE_USERS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_USERS_FILE));

        let config = Config {
            users: load_users(&users_file)?,
            store: FtpConfig {
                host: required(vars, "SLUICE_HOST")?,
                port: parsed(vars, "SLUICE_PORT", DEFAULT_STORE_PORT)?,
                secret_file: vars
                    .get("SLUICE_SECRET_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRET_FILE)),
                ca_file: vars
                    .get("SLUICE_CA_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CA_FILE)),
            },
            paths: SluicePaths::new(
                optional(vars, "SLUICE_INBOUND_DIR", DEFAULT_INBOUND_DIR),
                optional(vars, "SLUICE_OUTBOUND_DIR", DEFAULT_OUTBOUND_DIR),
            ),
            data_service_url: required(vars, "DATA_SERVICE_URL")?,
            credentials: CredentialConfig {
                token_url: required(vars, "TOKEN_ENDPOINT")?,
                client_id: required(vars, "CLIENT_ID")?,
                scope: required(vars, "TOKEN_SCOPE")?,
                client_secret: required(vars, "CLIENT_SECRET")?,
            },
            http: HttpTimeouts {
                connect: Duration::from_millis(parsed(
                    vars,
                    "HTTP_CONNECT_TIMEOUT_MS",
                    DEFAULT_CONNECT_TIMEOUT_MS,
                )?),
                response: Duration::from_millis(parsed(
                    vars,
                    "HTTP_RESPONSE_TIMEOUT_MS",
                    DEFAULT_RESPONSE_TIMEOUT_MS,
                )?),
            },
            run_as_job: vars
                .get("RUN_AS_JOB")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            trigger: optional(vars, "TRIGGER_SCHEDULE", DEFAULT_TRIGGER_SCHEDULE).parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.users.is_empty() {
            bail!("No users configured");
        }

        if self.users.iter().any(|u| u.username.trim().is_empty()) {
            bail!("Configured usernames cannot be empty");
        }

        if self.store.host.is_empty() {
            bail!("SLUICE_HOST cannot be empty");
        }

        if self.store.port == 0 {
            bail!("SLUICE_PORT must be greater than 0");
        }

        if self.paths.inbound_dir() == self.paths.outbound_dir() {
            bail!("Inbound and outbound directories must differ");
        }

        for (name, value) in [
            ("DATA_SERVICE_URL", &self.data_service_url),
            ("TOKEN_ENDPOINT", &self.credentials.token_url),
            ("CLIENT_ID", &self.credentials.client_id),
            ("CLIENT_SECRET", &self.credentials.client_secret),
        ] {
            if value.trim().is_empty() {
                bail!("{} cannot be empty", name);
            }
        }

        if self.http.connect.is_zero() || self.http.response.is_zero() {
            bail!("HTTP timeouts must be greater than 0");
        }

        Ok(())
    }
}

/// Read the ordered list of configured users
///
/// The file is a JSON array of objects with a `bruker` field; other fields are ignored.
pub fn load_users(path: &Path) -> anyhow::Result<Vec<ConfiguredUser>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read users file {}", path.display()))?;

    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse users file {}", path.display()))
}

fn required(vars: &HashMap<String, String>, key: &str) -> anyhow::Result<String> {
    match vars.get(key) {
        Some(value) => Ok(value.clone()),
        None => bail!("{} must be set", key),
    }
}

fn optional(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T>(vars: &HashMap<String, String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars.get(key) {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, value)),
        None => Ok(default),
    }
}
