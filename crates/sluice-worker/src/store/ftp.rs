//! FTPS implementation of the remote store
//!
//! Sessions are upgraded with `AUTH TLS` before login, and the server
//! certificate must chain to a CA from `ca_file` and match `host`. Credentials
//! and file contents never cross the wire in plaintext.
//!
//! `suppaftp`'s blocking stream is used. Each operation moves the stream into
//! `spawn_blocking` and takes it back afterwards, so one control connection
//! serves the whole session.
//!
//! # Examples
//!
//! ```rust,ignore
//! use sluice_worker::store::{ftp::{FtpConfig, FtpConnector}, StoreConnector};
//!
//! let connector = FtpConnector::new(FtpConfig {
//!     host: "sluice.example.org".to_string(),
//!     port: 21,
//!     secret_file: "/var/run/secrets/sluice/password".into(),
//!     ca_file: "/var/run/secrets/sluice/ca.pem".into(),
//! });
//!
//! let mut store = connector.connect("alice").await?;
//! let names = store.list("inbound").await?;
//! store.close().await?;
//! ```

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rustls::pki_types::{pem::PemObject, CertificateDer};
use rustls::{ClientConfig, RootCertStore};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use suppaftp::{RustlsConnector, RustlsFtpStream};
use tracing::{debug, info, warn};

use super::{file_name, RemoteStore, StoreConnector};

/// Configuration for the FTPS connection
#[derive(Debug, Clone)]
pub struct FtpConfig {
    /// FTP server hostname, also the name its certificate must carry
    pub host: String,

    /// FTP server port (usually 21)
    pub port: u16,

    /// File holding the login secret shared by all configured users
    pub secret_file: PathBuf,

    /// PEM bundle of the CA certificates trusted for the server
    pub ca_file: PathBuf,
}

/// Build a TLS client configuration trusting only the certificates in `ca_file`
pub fn tls_config(ca_file: &Path) -> Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();

    let certs = CertificateDer::pem_file_iter(ca_file)
        .with_context(|| format!("Failed to read CA file {}", ca_file.display()))?;
    for cert in certs {
        let cert = cert.with_context(|| format!("Invalid PEM in CA file {}", ca_file.display()))?;
        roots
            .add(cert)
            .with_context(|| format!("Unusable certificate in CA file {}", ca_file.display()))?;
    }

    if roots.is_empty() {
        bail!("No CA certificates found in {}", ca_file.display());
    }

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::aws_lc_rs::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .context("Failed to configure TLS protocol versions")?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Opens an FTPS session per user
pub struct FtpConnector {
    config: FtpConfig,
}

impl FtpConnector {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }

    fn connect_sync(
        config: &FtpConfig,
        tls: Arc<ClientConfig>,
        username: &str,
        secret: &str,
    ) -> Result<RustlsFtpStream> {
        debug!("Connecting to FTP server: {}:{}", config.host, config.port);

        let ftp_stream = RustlsFtpStream::connect(format!("{}:{}", config.host, config.port))
            .context("Failed to connect to FTP server")?;

        let mut ftp_stream = ftp_stream
            .into_secure(RustlsConnector::from(tls), &config.host)
            .context("TLS negotiation with FTP server failed")?;

        // Extended passive mode behaves better behind NAT
        ftp_stream.set_mode(suppaftp::Mode::ExtendedPassive);

        debug!("Logging in as: {}", username);
        ftp_stream
            .login(username, secret)
            .context("FTP login failed")?;

        ftp_stream
            .transfer_type(suppaftp::types::FileType::Binary)
            .context("Failed to set binary mode")?;

        Ok(ftp_stream)
    }
}

#[async_trait]
impl StoreConnector for FtpConnector {
    async fn connect(&self, username: &str) -> Result<Box<dyn RemoteStore>> {
        info!(host = %self.config.host, "Connecting to sluice");

        let secret = tokio::fs::read_to_string(&self.config.secret_file)
            .await
            .with_context(|| {
                format!("Failed to read secret file {}", self.config.secret_file.display())
            })?;

        let config = self.config.clone();
        let username = username.to_string();
        let stream = tokio::task::spawn_blocking(move || {
            let tls = tls_config(&config.ca_file)?;
            Self::connect_sync(&config, tls, &username, secret.trim())
        })
        .await
        .map_err(|e| anyhow!("FTP connect task panicked: {}", e))??;

        Ok(Box::new(FtpStore {
            stream: Some(stream),
        }))
    }
}

/// One logged-in FTPS session
pub struct FtpStore {
    stream: Option<RustlsFtpStream>,
}

impl FtpStore {
    /// Run a blocking operation on the session's stream
    async fn with_stream<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut RustlsFtpStream) -> Result<T> + Send + 'static,
    {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| anyhow!("FTP session is closed"))?;

        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut stream);
            (stream, result)
        })
        .await
        .map_err(|e| anyhow!("FTP task panicked: {}", e))?;

        self.stream = Some(stream);
        result
    }
}

#[async_trait]
impl RemoteStore for FtpStore {
    async fn list(&mut self, dir: &str) -> Result<Vec<String>> {
        let dir = dir.to_string();
        let entries = self
            .with_stream(move |stream| {
                debug!("Listing directory: {}", dir);
                stream
                    .list(Some(&dir))
                    .with_context(|| format!("Failed to list directory: {}", dir))
            })
            .await?;

        Ok(entries
            .iter()
            .filter_map(|line| FtpEntry::parse(line))
            .filter(|entry| !entry.is_directory)
            .filter_map(|entry| file_name(&entry.name).map(str::to_string))
            .collect())
    }

    async fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let path = path.to_string();
        self.with_stream(move |stream| {
            debug!("Downloading file: {}", path);
            let reader = stream
                .retr_as_buffer(&path)
                .with_context(|| format!("Failed to download file: {}", path))?;
            Ok(reader.into_inner())
        })
        .await
    }

    async fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let path = path.to_string();
        let data = data.to_vec();
        self.with_stream(move |stream| {
            debug!("Uploading {} bytes to {}", data.len(), path);
            stream
                .put_file(&path, &mut Cursor::new(data))
                .with_context(|| format!("Failed to upload file: {}", path))?;
            Ok(())
        })
        .await
    }

    async fn delete(&mut self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.with_stream(move |stream| {
            stream
                .rm(&path)
                .with_context(|| format!("Failed to delete file: {}", path))
        })
        .await
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        // Taken out first so Drop has nothing left to quit, even if QUIT fails
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || stream.quit())
            .await
            .map_err(|e| anyhow!("FTP quit task panicked: {}", e))?
            .context("Failed to quit FTP session")
    }
}

impl Drop for FtpStore {
    fn drop(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        let mut quit = move || {
            if let Err(e) = stream.quit() {
                warn!("Failed to quit FTP session gracefully: {}", e);
            }
        };

        // Never block a runtime worker on the control connection
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(quit);
            },
            Err(_) => quit(),
        }
    }
}

/// Parsed FTP directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpEntry {
    /// Entry name (filename or directory name)
    pub name: String,

    /// Whether this is a directory
    pub is_directory: bool,
}

impl FtpEntry {
    /// Parse an FTP LIST line into an entry
    ///
    /// Two layouts are understood:
    ///
    /// - Unix: `-rw-r--r--   1 ftp ftp  1234 Jan 15 12:00 request 2024.csv`,
    ///   everything after the eighth field is the name
    /// - DOS/IIS: `01-15-24  12:00PM  <DIR>  archive` or
    ///   `01-15-24  12:00PM  1234 a.csv`, everything after the third field is the name
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return None;
        }

        if parts[0].starts_with(|c: char| c.is_ascii_digit()) {
            return Some(Self {
                name: parts[3..].join(" "),
                is_directory: parts[2].eq_ignore_ascii_case("<DIR>"),
            });
        }

        let name = if parts.len() >= 9 {
            parts[8..].join(" ")
        } else {
            parts.last()?.to_string()
        };

        Some(Self {
            name,
            is_directory: parts[0].starts_with('d'),
        })
    }
}
