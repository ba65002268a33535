#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finreport/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Financial report ETL pipeline.
//!
//! This crate ties the stages together. It re-exports the core types, the
//! store and source implementations, and provides [`ReportPipeline`] which
//! runs download, import and view generation over them.
//!
//! # Features
//!
//! - `netease` - NetEase Finance statement source
//! - `sqlite` - SQLite destination store
//!
//! # Example
//!
//! ```rust,ignore
//! use finreport::{
//!     ColumnDiscovery, InMemoryReference, LoadMode, NeteaseSource, PipelineConfig,
//!     ReportPipeline, SqliteStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> finreport::Result<()> {
//!     let config = PipelineConfig::default();
//!     let store = Arc::new(SqliteStore::new(&config.database)?);
//!     let source = Arc::new(NeteaseSource::new(&config.user_agent, config.timeout())?);
//!     let pipeline = ReportPipeline::new(source, store.clone(), store, config);
//!
//!     let securities = pipeline.resolve(&["sh600000".to_string()], false).await?;
//!     let tables = pipeline.tables(&[])?;
//!     pipeline.download(&securities, &tables, false).await.log("download");
//!     pipeline.import(&securities, &tables, LoadMode::Replace).await?.log("import");
//!     pipeline.build_views(&tables, ColumnDiscovery::Representative).await.log("views");
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use finreport_core::*;

// Stores
#[cfg(feature = "sqlite")]
pub use finreport_store::SqliteStore;
pub use finreport_store::InMemoryReference;

// Sources
#[cfg(feature = "netease")]
pub use finreport_netease::{MarkerColumnFormat, NETEASE_TABLES, NeteaseSource};

pub use polars::prelude::DataFrame;

mod config;
mod fetch;
mod pipeline;

pub use config::PipelineConfig;
pub use fetch::{FetchOutcome, Fetcher, staged_path};
pub use pipeline::{ColumnDiscovery, ItemFailure, ReportPipeline, RunSummary};
