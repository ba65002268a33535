//! Store trait for loaded statement tables.
//!
//! This module defines the [`ReportStore`] trait that provides a unified interface
//! for creating destination tables, bulk-loading normalized records, and
//! maintaining the derived pivot views.

use async_trait::async_trait;
use polars::prelude::DataFrame;

use crate::{
    error::Result,
    table::{LoadMode, StatementTable},
    types::{NormalizedRecord, SecurityCode},
};

/// Trait for the relational store the pipeline loads into.
///
/// Every method is one logical unit of work: implementations acquire their
/// connection for the duration of the call and commit or roll back before
/// returning.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Prepares destination tables for a load.
    ///
    /// With [`LoadMode::Replace`] every table (and its view) is dropped and
    /// recreated in a single transaction. With [`LoadMode::Append`] missing
    /// tables are created and existing rows are kept.
    async fn prepare_tables(&self, tables: &[StatementTable], mode: LoadMode) -> Result<()>;

    /// Inserts a batch of records into a table in one transaction.
    ///
    /// Returns the number of rows inserted. A failure rolls back the whole batch.
    async fn insert_batch(
        &self,
        table: &StatementTable,
        records: &[NormalizedRecord],
    ) -> Result<usize>;

    /// Returns the distinct item names of a loaded table in first-inserted order.
    async fn item_names(&self, table: &StatementTable) -> Result<Vec<String>>;

    /// Creates or replaces the pivot view of a table with one column per item.
    async fn create_view(&self, table: &StatementTable, items: &[String]) -> Result<()>;

    /// Reads the long-format rows of a table, optionally for one security.
    ///
    /// Returns a DataFrame with columns: security_code, period, item_name, value.
    async fn table_frame(
        &self,
        table: &StatementTable,
        security: Option<&SecurityCode>,
    ) -> Result<DataFrame>;

    /// Reads the pivot view of a table, optionally for one security.
    ///
    /// Returns a DataFrame with columns security_code, period, then one column per item.
    async fn view_frame(
        &self,
        table: &StatementTable,
        security: Option<&SecurityCode>,
    ) -> Result<DataFrame>;
}
