//! Worker error types
//!
//! Every failure is reduced to a [`FailureKind`] at the smallest scope it
//! affects (file or user). `Display` output is safe for the public log; the
//! detailed form with response bodies is only produced by [`SyncError::detail`].

use thiserror::Error;

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Remote HTTP service a request was sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Credential,
    DataService,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::Credential => write!(f, "credential service"),
            Service::DataService => write!(f, "data service"),
        }
    }
}

/// Coarse classification used in run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Config,
    Credential,
    Resolve,
    Store,
    Integrity,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Config => write!(f, "config"),
            FailureKind::Credential => write!(f, "credential"),
            FailureKind::Resolve => write!(f, "resolve"),
            FailureKind::Store => write!(f, "store"),
            FailureKind::Integrity => write!(f, "integrity"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-success status; `body` is kept out of `Display`
    #[error("Request to {service} failed with status {status}")]
    Status {
        service: Service,
        status: u16,
        body: String,
    },

    #[error("Request to {service} failed: {source}")]
    Transport {
        service: Service,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed response from {service}: {source}")]
    Decode {
        service: Service,
        #[source]
        source: serde_json::Error,
    },

    #[error("Credential response did not contain an access token")]
    MissingToken,

    #[error("Remote store error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("Integrity mismatch: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },
}

impl SyncError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Full description for the secure log, including response bodies
    pub fn detail(&self) -> String {
        match self {
            SyncError::Status { body, .. } => format!("{self}: {}", body.replace('\n', " ")),
            other => format!("{other:?}"),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Config(_) => FailureKind::Config,
            SyncError::Status { service, .. }
            | SyncError::Transport { service, .. }
            | SyncError::Decode { service, .. } => match service {
                Service::Credential => FailureKind::Credential,
                Service::DataService => FailureKind::Resolve,
            },
            SyncError::MissingToken => FailureKind::Credential,
            SyncError::Store(_) => FailureKind::Store,
            SyncError::Integrity { .. } => FailureKind::Integrity,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_hides_body() {
        let err = SyncError::Status {
            service: Service::DataService,
            status: 500,
            body: "identifier 12345678901 unknown".to_string(),
        };

        assert_eq!(err.to_string(), "Request to data service failed with status 500");
        assert!(err.detail().contains("12345678901"));
        assert_eq!(err.kind(), FailureKind::Resolve);
    }

    #[test]
    fn test_kind_follows_service() {
        let err = SyncError::Status {
            service: Service::Credential,
            status: 401,
            body: String::new(),
        };
        assert_eq!(err.kind(), FailureKind::Credential);
        assert_eq!(SyncError::MissingToken.kind(), FailureKind::Credential);
        assert_eq!(
            SyncError::Store(anyhow::anyhow!("connection reset")).kind(),
            FailureKind::Store
        );
    }
}
