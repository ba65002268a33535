//! Source and reference traits.
//!
//! This module defines the seams between the pipeline and its collaborators:
//!
//! - [`StatementSource`] - A remote provider of raw statement files
//! - [`TableFormat`] - The parsing strategy for one provider's file layout
//! - [`ReferenceData`] - Security, market and sector lookup

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

use crate::{
    error::Result,
    table::StatementTable,
    types::{NormalizedRecord, Security, SecurityCode, Sector},
};

/// Lazy sequence of normalized records produced by a [`TableFormat`].
pub type RecordStream = Box<dyn Iterator<Item = Result<NormalizedRecord>> + Send>;

/// Parsing strategy for a provider's staged file layout.
///
/// Each provider with a distinct layout supplies its own implementation, so a
/// new source is added by implementing this trait rather than by branching on
/// the provider name.
pub trait TableFormat: Send + Sync + Debug {
    /// Returns the name of this format (e.g. "marker-column").
    fn name(&self) -> &str;

    /// Opens a staged file and returns its records in long format.
    ///
    /// Structural problems that can be detected up front (unreadable file,
    /// missing header) are returned immediately; problems in later rows are
    /// yielded as `Err` items by the stream.
    fn normalize(&self, path: &Path, security: &SecurityCode) -> Result<RecordStream>;
}

/// A remote provider of raw financial statement files.
#[async_trait]
pub trait StatementSource: Send + Sync + Debug {
    /// Returns the name of this source (e.g. "NetEase Finance").
    fn name(&self) -> &str;

    /// Returns a description of this source.
    fn description(&self) -> &str;

    /// Returns the statement tables this source serves, in registry order.
    fn tables(&self) -> &[StatementTable];

    /// Returns the parsing strategy for files staged from this source.
    fn format(&self) -> &dyn TableFormat;

    /// Issues a single GET for `url` and streams the body into `dest`.
    ///
    /// Returns the number of bytes written. Callers own cleanup of `dest` on
    /// failure.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Lookup of security, market and sector reference data.
#[async_trait]
pub trait ReferenceData: Send + Sync {
    /// Fetches a security by code, `None` when unknown.
    async fn security(&self, code: &SecurityCode) -> Result<Option<Security>>;

    /// Fetches a sector by code, `None` when unknown.
    async fn sector(&self, code: &str) -> Result<Option<Sector>>;

    /// Lists every security of a market in reference order.
    async fn market_securities(&self, market: &str) -> Result<Vec<Security>>;
}
