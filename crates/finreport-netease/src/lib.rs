#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finreport/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! NetEase Finance statement source.
//!
//! This crate provides:
//!
//! - [`NETEASE_TABLES`] - The static registry of statement tables NetEase serves
//! - [`NeteaseSource`] - A [`StatementSource`] that streams files over HTTP
//! - [`MarkerColumnFormat`] - The parsing strategy for NetEase's CSV layout
//!
//! # Example
//!
//! ```no_run
//! use finreport_core::{SecurityCode, StatementSource};
//! use finreport_netease::{NETEASE_TABLES, NeteaseSource};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = NeteaseSource::new("finreport/0.1", None)?;
//!     let code = SecurityCode::new("sh600000");
//!     let table = &NETEASE_TABLES[0];
//!     let bytes = source.download(&table.url_for(&code), Path::new("zycwzb.csv")).await?;
//!     println!("downloaded {bytes} bytes");
//!     Ok(())
//! }
//! ```

mod format;
mod tables;

pub use format::{DEFAULT_MARKERS, MarkerColumnFormat};
pub use tables::NETEASE_TABLES;

use async_trait::async_trait;
use finreport_core::{ReportError, Result, StatementSource, StatementTable, TableFormat};
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// NetEase Finance statement source.
///
/// Each download is a single GET with no retry; the transport's timeout is the
/// only bound on how long a request may take.
#[derive(Debug)]
pub struct NeteaseSource {
    client: reqwest::Client,
    format: MarkerColumnFormat,
}

impl NeteaseSource {
    /// Creates a source with the given user agent and optional request timeout.
    ///
    /// Files are decoded as GBK.
    ///
    /// # Errors
    /// Returns [`ReportError::Network`] if the HTTP client cannot be built.
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ReportError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client))
    }

    /// Creates a source with a pre-configured HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            format: MarkerColumnFormat::new(),
        }
    }

    /// Replaces the parsing strategy, e.g. to change the file encoding.
    #[must_use]
    pub fn with_format(mut self, format: MarkerColumnFormat) -> Self {
        self.format = format;
        self
    }
}

#[async_trait]
impl StatementSource for NeteaseSource {
    fn name(&self) -> &str {
        "NetEase Finance"
    }

    fn description(&self) -> &str {
        "NetEase Finance financial statements - key indicators, capability ratios, \
         cash flow, balance sheet and income statement CSV exports for A-share securities"
    }

    fn tables(&self) -> &[StatementTable] {
        NETEASE_TABLES
    }

    fn format(&self) -> &dyn TableFormat {
        &self.format
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ReportError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ReportError::Network(format!(
                "Failed to fetch {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ReportError::io(dest, e))?;

        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ReportError::Network(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ReportError::io(dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| ReportError::io(dest, e))?;

        debug!(bytes = written, path = %dest.display(), "Download complete");
        Ok(written)
    }
}
