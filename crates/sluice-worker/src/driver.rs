//! Reconciliation driver
//!
//! Users are processed one at a time and, within a user, pending files in
//! listing order. A failure is contained at the smallest scope it affects:
//!
//! - credential, connect or listing failure aborts that user only
//! - resolve, store or integrity failure skips that file only
//!
//! A skipped file keeps its inbound copy and is picked up on the next run.

use std::collections::HashSet;
use std::sync::Arc;

use sluice_common::logging::SECURE_TARGET;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{FailureKind, Result};
use crate::extractor::extract_from_bytes;
use crate::http::build_client;
use crate::integrity::{deliver_and_verify, Delivery};
use crate::resolver::DataResolver;
use crate::serializer::serialize;
use crate::store::{RemoteStore, StoreConnector};
use crate::token::{AccessToken, TokenClient};

/// Result of one pending file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Delivered,
    Skipped(FailureKind),
}

/// Terminal state of one user's run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    DoneClean { delivered: usize },
    DoneWithSkips { delivered: usize, skipped: usize },
    /// Nothing was attempted past the failing step
    Aborted(FailureKind),
}

impl UserOutcome {
    fn from_counts(delivered: usize, skipped: usize) -> Self {
        if skipped == 0 {
            UserOutcome::DoneClean { delivered }
        } else {
            UserOutcome::DoneWithSkips { delivered, skipped }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserReport {
    pub username: String,
    pub outcome: UserOutcome,
}

/// Outcome of every configured user, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub users: Vec<UserReport>,
}

impl RunReport {
    pub fn delivered(&self) -> usize {
        self.users
            .iter()
            .map(|u| match u.outcome {
                UserOutcome::DoneClean { delivered } | UserOutcome::DoneWithSkips { delivered, .. } => {
                    delivered
                },
                UserOutcome::Aborted(_) => 0,
            })
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.users
            .iter()
            .map(|u| match u.outcome {
                UserOutcome::DoneWithSkips { skipped, .. } => skipped,
                _ => 0,
            })
            .sum()
    }

    pub fn aborted(&self) -> usize {
        self.users
            .iter()
            .filter(|u| matches!(u.outcome, UserOutcome::Aborted(_)))
            .count()
    }

    pub fn outcome(&self, username: &str) -> Option<UserOutcome> {
        self.users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.outcome)
    }
}

/// Inbound names without a same-named outbound file, in inbound order
///
/// Each name appears at most once even if the listing repeats it.
pub fn pending_files(inbound: &[String], outbound: &[String]) -> Vec<String> {
    let done: HashSet<&str> = outbound.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    inbound
        .iter()
        .filter(|name| !done.contains(name.as_str()))
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Drives one reconciliation run over all configured users
#[derive(Clone)]
pub struct Reconciler {
    config: Arc<Config>,
    tokens: TokenClient,
    resolver: DataResolver,
    connector: Arc<dyn StoreConnector>,
}

impl Reconciler {
    /// Build the HTTP clients from the configuration
    pub fn new(config: Arc<Config>, connector: Arc<dyn StoreConnector>) -> Result<Self> {
        let http = build_client(&config.http)?;

        Ok(Self {
            tokens: TokenClient::new(http.clone(), config.credentials.clone()),
            resolver: DataResolver::new(http, config.data_service_url.clone()),
            config,
            connector,
        })
    }

    /// Reconcile every configured user once
    pub async fn run_once(&self) -> RunReport {
        info!(users = self.config.users.len(), "Starting reconciliation run");

        let mut report = RunReport::default();
        for user in &self.config.users {
            let outcome = self.reconcile_user(&user.username).await;
            report.users.push(UserReport {
                username: user.username.clone(),
                outcome,
            });
        }

        info!(
            delivered = report.delivered(),
            skipped = report.skipped(),
            aborted = report.aborted(),
            "Reconciliation run finished"
        );

        report
    }

    /// Reconcile one user's sluice
    ///
    /// The store session is closed before returning, whatever happened.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_user(&self, username: &str) -> UserOutcome {
        let token = match self.tokens.fetch().await {
            Ok(token) => token,
            Err(e) => {
                error!(kind = %e.kind(), "Could not acquire credential, skipping user: {}", e);
                return UserOutcome::Aborted(e.kind());
            },
        };

        let mut store = match self.connector.connect(username).await {
            Ok(store) => store,
            Err(e) => {
                error!("Could not connect to sluice, skipping user: {:#}", e);
                return UserOutcome::Aborted(FailureKind::Store);
            },
        };

        let outcome = self.reconcile_files(store.as_mut(), &token).await;

        if let Err(e) = store.close().await {
            warn!("Failed to close sluice session: {:#}", e);
        }

        outcome
    }

    async fn reconcile_files(&self, store: &mut dyn RemoteStore, token: &AccessToken) -> UserOutcome {
        let pending = match self.list_pending(store).await {
            Ok(pending) => pending,
            Err(e) => {
                error!("Could not list sluice directories, skipping user: {}", e);
                return UserOutcome::Aborted(e.kind());
            },
        };

        info!(pending = pending.len(), "Found pending files");

        let mut delivered = 0;
        let mut skipped = 0;
        for file_name in &pending {
            match self.process_file(store, token, file_name).await {
                FileOutcome::Delivered => delivered += 1,
                FileOutcome::Skipped(_) => skipped += 1,
            }
        }

        UserOutcome::from_counts(delivered, skipped)
    }

    async fn list_pending(&self, store: &mut dyn RemoteStore) -> Result<Vec<String>> {
        let paths = &self.config.paths;
        let inbound = store.list(paths.inbound_dir()).await?;
        let outbound = store.list(paths.outbound_dir()).await?;
        Ok(pending_files(&inbound, &outbound))
    }

    /// Turn one pending inbound file into a verified outbound result
    pub async fn process_file(
        &self,
        store: &mut dyn RemoteStore,
        token: &AccessToken,
        file_name: &str,
    ) -> FileOutcome {
        match self.deliver_file(store, token, file_name).await {
            Ok(_) => FileOutcome::Delivered,
            Err(e) => {
                warn!(file = %file_name, kind = %e.kind(), "Skipping file until next run: {}", e);
                FileOutcome::Skipped(e.kind())
            },
        }
    }

    async fn deliver_file(
        &self,
        store: &mut dyn RemoteStore,
        token: &AccessToken,
        file_name: &str,
    ) -> Result<Delivery> {
        let contents = store.read(&self.config.paths.inbound(file_name)).await?;
        let identifiers = extract_from_bytes(&contents);

        info!(file = %file_name, count = identifiers.len(), "Extracted identifiers");
        for identifier in &identifiers {
            info!(target: SECURE_TARGET, file = %file_name, identifier = %identifier, "Extracted identifier");
        }

        let records = if identifiers.is_empty() {
            info!(file = %file_name, "No identifiers, writing header-only result");
            Vec::new()
        } else {
            self.resolver.resolve(token, &identifiers).await?
        };

        for record in &records {
            info!(
                target: SECURE_TARGET,
                file = %file_name,
                identifier = %record.identifier,
                fom = ?record.period_start,
                tom = ?record.period_end,
                "Writing record"
            );
        }

        let payload = serialize(&records);
        deliver_and_verify(store, &self.config.paths, file_name, &payload).await
    }
}
