//! Error types for pipeline operations.
//!
//! This module defines [`ReportError`] which covers every failure that can occur
//! while resolving securities, fetching statement files, normalizing them, or
//! loading them into the store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during pipeline operations.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Network-related errors (connection failures, bad status codes, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Filesystem errors while staging or reading source files.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A staged source file does not have the expected structure.
    #[error("Malformed source {path} for {security} (row {row}): {reason}")]
    MalformedSource {
        /// The security whose file was being read.
        security: String,
        /// Path of the staged file.
        path: PathBuf,
        /// One-based row number in the file, `0` when the whole file is at fault.
        row: usize,
        /// What was wrong with the row.
        reason: String,
    },

    /// A pivot view could not be generated for a table.
    #[error("Cannot build view for {table}: {reason}")]
    ViewGeneration {
        /// The table whose view was requested.
        table: String,
        /// Why generation failed.
        reason: String,
    },

    /// Error interacting with the relational store.
    #[error("Store error: {0}")]
    Store(String),

    /// Error parsing configuration or reference data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A named item (table, security, sector) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl ReportError {
    /// Builds an [`ReportError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error describes a structurally invalid source file.
    #[must_use]
    pub const fn is_malformed_source(&self) -> bool {
        matches!(self, Self::MalformedSource { .. })
    }
}

/// Result type alias using [`ReportError`].
pub type Result<T> = std::result::Result<T, ReportError>;
