//! Client-credentials token acquisition

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::CredentialConfig;
use crate::error::{Result, Service, SyncError};
use crate::http;

/// Bearer credential for the data service
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    scope: &'a str,
    grant_type: &'static str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Fetches bearer tokens with the client-credentials grant
#[derive(Clone)]
pub struct TokenClient {
    http: Client,
    config: CredentialConfig,
}

impl TokenClient {
    pub fn new(http: Client, config: CredentialConfig) -> Self {
        Self { http, config }
    }

    /// Exchange the client credentials for an access token
    pub async fn fetch(&self) -> Result<AccessToken> {
        debug!(token_url = %self.config.token_url, "Requesting access token");

        let request = TokenRequest {
            client_id: &self.config.client_id,
            scope: &self.config.scope,
            grant_type: "client_credentials",
            client_secret: &self.config.client_secret,
        };

        let body = http::post_json(
            &self.http,
            Service::Credential,
            &self.config.token_url,
            &request,
            None,
        )
        .await?;

        let response: TokenResponse =
            serde_json::from_str(&body).map_err(|source| SyncError::Decode {
                service: Service::Credential,
                source,
            })?;

        match response.access_token {
            Some(token) if !token.is_empty() => Ok(AccessToken(token)),
            _ => {
                error!("Credential response did not contain an access token");
                Err(SyncError::MissingToken)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::http::{build_client, HttpTimeouts};
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client_for(server: &MockServer) -> TokenClient {
        TokenClient::new(
            build_client(&HttpTimeouts::default()).unwrap(),
            CredentialConfig {
                token_url: format!("{}/token", server.uri()),
                client_id: "worker".to_string(),
                scope: "api://data/.default".to_string(),
                client_secret: "hunter2".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_fetch_sends_client_credentials_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_json(json!({
                "client_id": "worker",
                "scope": "api://data/.default",
                "grant_type": "client_credentials",
                "client_secret": "hunter2"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "SUPDOGE", "expires_in": 3599})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server).fetch().await.unwrap();
        assert_eq!(token.secret(), "SUPDOGE");
    }

    #[tokio::test]
    async fn test_missing_access_token_is_credential_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch().await.unwrap_err();
        assert!(matches!(err, SyncError::MissingToken));
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::Credential);
    }

    #[test]
    fn test_debug_redacts_token() {
        assert_eq!(format!("{:?}", AccessToken::new("s3cr3t")), "AccessToken(<redacted>)");
    }
}
