//! Sluice Worker Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Reconciles per-user file sluice directories on a remote file store.
//!
//! # Architecture
//!
//! - **extractor**: Pulls subject identifiers out of inbound request files
//! - **resolver**: Resolves an identifier batch against the data service
//! - **serializer**: Renders result records into the fixed output format
//! - **integrity**: Writes payload + checksum, verifies, then deletes the source
//! - **driver**: Per-user reconciliation (credential, listing, per-file work)
//! - **store**: Remote store abstraction with FTP and in-memory implementations
//! - **token**: Client-credentials token acquisition
//! - **trigger**: Batch and resident (scheduled) invocation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sluice_worker::{config::Config, driver::Reconciler, store::ftp::FtpConnector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(Config::load()?);
//!     let connector = Arc::new(FtpConnector::new(config.store.clone()));
//!     let reconciler = Reconciler::new(config, connector)?;
//!
//!     let report = reconciler.run_once().await;
//!     tracing::info!(delivered = report.delivered(), "run finished");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod extractor;
pub mod http;
pub mod integrity;
pub mod resolver;
pub mod serializer;
pub mod store;
pub mod token;
pub mod trigger;

pub use config::Config;
pub use driver::{FileOutcome, Reconciler, RunReport, UserOutcome};
pub use error::{FailureKind, SyncError};
