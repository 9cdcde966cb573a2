//! Remote file store abstraction
//!
//! A [`StoreConnector`] opens one [`RemoteStore`] session per configured user.
//! The driver uses that session for every listing, read, write and delete of
//! the user's files and then closes it.
//!
//! - **ftp**: FTP implementation used in production
//! - **memory**: In-memory store with fault injection, used by tests

use anyhow::Result;
use async_trait::async_trait;

pub mod ftp;
pub mod memory;

/// One open session against a user's sluice
#[async_trait]
pub trait RemoteStore: Send {
    /// File names in a directory, in server order
    async fn list(&mut self, dir: &str) -> Result<Vec<String>>;

    /// Full contents of a file
    async fn read(&mut self, path: &str) -> Result<Vec<u8>>;

    /// Create or truncate a file with the given contents
    async fn write(&mut self, path: &str, data: &[u8]) -> Result<()>;

    async fn delete(&mut self, path: &str) -> Result<()>;

    /// End the session
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens sessions for configured users
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, username: &str) -> Result<Box<dyn RemoteStore>>;
}

/// Inbound and outbound directory layout of a sluice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SluicePaths {
    inbound: String,
    outbound: String,
}

impl SluicePaths {
    pub fn new(inbound: impl Into<String>, outbound: impl Into<String>) -> Self {
        Self {
            inbound: trim_dir(inbound.into()),
            outbound: trim_dir(outbound.into()),
        }
    }

    pub fn inbound_dir(&self) -> &str {
        &self.inbound
    }

    pub fn outbound_dir(&self) -> &str {
        &self.outbound
    }

    pub fn inbound(&self, file_name: &str) -> String {
        format!("{}/{}", self.inbound, file_name)
    }

    pub fn outbound(&self, file_name: &str) -> String {
        format!("{}/{}", self.outbound, file_name)
    }
}

impl Default for SluicePaths {
    fn default() -> Self {
        Self::new("inbound", "outbound")
    }
}

fn trim_dir(dir: String) -> String {
    dir.trim_end_matches('/').to_string()
}

/// Bare file name of a listing entry
///
/// Servers may return entries with the directory prefixed; `.` and `..` are dropped.
pub fn file_name(entry: &str) -> Option<&str> {
    let name = entry.trim_end_matches('/').rsplit('/').next()?;
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}
