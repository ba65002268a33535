#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finreport/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Store implementations for the finreport pipeline.
//!
//! This crate provides implementations of the [`ReportStore`] and
//! [`ReferenceData`] traits from `finreport-core`:
//!
//! - [`SqliteStore`] - Persistent SQLite store (default, requires `sqlite` feature)
//! - [`InMemoryReference`] - In-memory reference data

/// In-memory reference data.
pub mod memory;

/// Pivot view SQL generation.
#[cfg(feature = "sqlite")]
pub mod sql;
/// SQLite-based store implementation.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the traits for convenience
pub use finreport_core::{ReferenceData, ReportStore};

pub use memory::InMemoryReference;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
