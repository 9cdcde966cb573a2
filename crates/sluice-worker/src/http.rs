//! HTTP plumbing shared by the credential and data service clients
//!
//! Both services are called with a JSON `POST`. Any non-success response is
//! reported twice: a short public message without the body, and a secure
//! message carrying the body for operators.

use reqwest::{header, Client};
use serde::Serialize;
use sluice_common::logging::SECURE_TARGET;
use std::time::Duration;
use tracing::error;

use crate::error::{Result, Service, SyncError};

/// Network timeouts for outbound HTTP calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Time allowed to establish the connection
    pub connect: Duration,
    /// Time allowed for the whole request, including the response body
    pub response: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(1),
            response: Duration::from_secs(5),
        }
    }
}

/// Build the client shared by the token and data service calls
pub fn build_client(timeouts: &HttpTimeouts) -> Result<Client> {
    Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.response)
        .build()
        .map_err(|e| SyncError::config(format!("Failed to build HTTP client: {}", e)))
}

/// POST a JSON body and return the response text on a 2xx status
pub async fn post_json<B>(
    client: &Client,
    service: Service,
    url: &str,
    body: &B,
    bearer: Option<&str>,
) -> Result<String>
where
    B: Serialize + ?Sized,
{
    let mut request = client
        .post(url)
        .header(header::ACCEPT, "application/json")
        .json(body);

    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(source) => {
            let err = SyncError::Transport { service, source };
            report_failure(&err);
            return Err(err);
        },
    };

    let status = response.status();
    // The body is read either way: it is the payload on success and the
    // diagnostic on failure.
    let text = match response.text().await {
        Ok(text) => text,
        Err(source) => {
            let err = SyncError::Transport { service, source };
            report_failure(&err);
            return Err(err);
        },
    };

    if !status.is_success() {
        let err = SyncError::Status {
            service,
            status: status.as_u16(),
            body: text,
        };
        report_failure(&err);
        return Err(err);
    }

    Ok(text)
}

/// Emit the public and the detailed signal for a failed call
pub fn report_failure(err: &SyncError) {
    error!(kind = %err.kind(), "{}", err);
    error!(target: SECURE_TARGET, kind = %err.kind(), "{}", err.detail());
}
