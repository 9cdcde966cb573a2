//! Sluice Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the sluice reconciliation worker.
//!
//! # Overview
//!
//! - **Error Handling**: Custom error types and result types
//! - **Checksums**: SHA-256 helpers used to verify delivered payloads
//! - **Logging**: Public and secure log sinks on top of `tracing`
//! - **Types**: The result record model returned by the data service
//!
//! # Example
//!
//! ```no_run
//! use sluice_common::Result;
//! use sluice_common::checksum::{sha256_hex, verify_checksum};
//!
//! fn check(payload: &[u8], expected: &str) -> Result<()> {
//!     verify_checksum(payload, expected)?;
//!     tracing::info!(checksum = %sha256_hex(payload), "payload verified");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SluiceError};
