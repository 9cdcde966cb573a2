//! Data service client
//!
//! The whole identifier batch of one inbound file goes out in a single request.
//! There is no retry: a failed file stays in the inbound directory and is
//! picked up again on the next run.

use reqwest::Client;
use sluice_common::types::ResultRecord;
use tracing::info;

use crate::error::{Result, Service, SyncError};
use crate::http;
use crate::token::AccessToken;

/// Path of the resolve endpoint relative to the service base URL
pub const RESOLVE_PATH: &str = "utbetalinger";

/// Resolves subject identifiers to result records
#[derive(Clone)]
pub struct DataResolver {
    http: Client,
    base_url: String,
}

impl DataResolver {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), RESOLVE_PATH)
    }

    /// Resolve one batch of identifiers
    ///
    /// Failures have already been reported to the public and secure logs when
    /// this returns `Err`.
    pub async fn resolve(
        &self,
        token: &AccessToken,
        identifiers: &[String],
    ) -> Result<Vec<ResultRecord>> {
        let url = self.endpoint();
        info!(url = %url, count = identifiers.len(), "Resolving identifiers");

        let body = http::post_json(
            &self.http,
            Service::DataService,
            &url,
            identifiers,
            Some(token.secret()),
        )
        .await?;

        serde_json::from_str(&body).map_err(|source| {
            let err = SyncError::Decode {
                service: Service::DataService,
                source,
            };
            http::report_failure(&err);
            err
        })
    }
}
