#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/finreport/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the financial report ETL pipeline.
//!
//! This crate provides the foundational abstractions shared by every stage:
//!
//! - [`StatementSource`](provider::StatementSource) - Remote provider of statement files
//! - [`TableFormat`](provider::TableFormat) - Parsing strategy for a provider's layout
//! - [`ReferenceData`](provider::ReferenceData) - Security and sector lookup
//! - [`ReportStore`](store::ReportStore) - Destination store for loaded tables
//! - [`SecurityResolver`](resolver::SecurityResolver) - Identifier resolution

/// Error types for pipeline operations.
pub mod error;
/// Source, format and reference traits.
pub mod provider;
/// Identifier resolution.
pub mod resolver;
/// Store trait for loaded tables.
pub mod store;
/// Statement table descriptors and load modes.
pub mod table;
/// Core data types (SecurityCode, Security, NormalizedRecord, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{ReportError, Result};
pub use provider::{RecordStream, ReferenceData, StatementSource, TableFormat};
pub use resolver::SecurityResolver;
pub use store::ReportStore;
pub use table::{LoadMode, StatementTable, find_table};
pub use types::{Market, NormalizedRecord, ReferenceSnapshot, Security, SecurityCode, Sector};
