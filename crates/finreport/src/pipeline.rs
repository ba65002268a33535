//! Pipeline orchestration: resolve, fetch, normalize, load, and build views.

use std::collections::HashSet;
use std::sync::Arc;

use polars::prelude::DataFrame;
use tracing::{debug, info, warn};

use finreport_core::{
    LoadMode, NormalizedRecord, ReferenceData, ReportError, ReportStore, Result, SecurityCode,
    SecurityResolver, StatementSource, StatementTable, find_table,
};

use crate::config::PipelineConfig;
use crate::fetch::{FetchOutcome, Fetcher, staged_path};

/// How the columns of a pivot view are discovered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColumnDiscovery {
    /// Read the representative security's staged file.
    ///
    /// Assumes that file lists every line item the table can contain; items
    /// only other securities report do not become columns.
    #[default]
    Representative,
    /// Scan the distinct item names of every loaded row.
    LoadedTable,
}

/// One item that could not be processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemFailure {
    /// Security involved, if the failure is specific to one.
    pub security: Option<SecurityCode>,
    /// Statement table involved.
    pub table: &'static str,
    /// What went wrong.
    pub reason: String,
}

/// Counts and failures of one pipeline command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items attempted.
    pub total: usize,
    /// Items completed.
    pub succeeded: usize,
    /// Items skipped (already staged, or nothing staged to load).
    pub skipped: usize,
    /// Items that failed.
    pub failed: Vec<ItemFailure>,
}

impl RunSummary {
    fn fail(&mut self, security: Option<&SecurityCode>, table: &StatementTable, reason: String) {
        warn!(
            security = security.map(SecurityCode::as_str).unwrap_or("-"),
            table = table.name,
            "{}",
            reason
        );
        self.failed.push(ItemFailure {
            security: security.cloned(),
            table: table.name,
            reason,
        });
    }

    /// Logs the summary of a finished command.
    pub fn log(&self, action: &str) {
        info!(
            total = self.total,
            succeeded = self.succeeded,
            skipped = self.skipped,
            failed = self.failed.len(),
            "{} finished",
            action
        );
    }
}

/// The ETL pipeline over one source, one store, and one reference set.
///
/// Work is strictly sequential: one security and one table at a time. Failures
/// of individual items are logged and collected in the [`RunSummary`]; they
/// never stop the run.
pub struct ReportPipeline {
    source: Arc<dyn StatementSource>,
    store: Arc<dyn ReportStore>,
    reference: Arc<dyn ReferenceData>,
    config: PipelineConfig,
}

impl std::fmt::Debug for ReportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportPipeline")
            .field("source", &self.source.name())
            .field("format", &self.source.format().name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReportPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        source: Arc<dyn StatementSource>,
        store: Arc<dyn ReportStore>,
        reference: Arc<dyn ReferenceData>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            store,
            reference,
            config,
        }
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Selects statement tables by name, or every table when `names` is empty.
    ///
    /// # Errors
    /// Returns [`ReportError::NotFound`] for a name the source does not serve.
    pub fn tables(&self, names: &[String]) -> Result<Vec<StatementTable>> {
        let all = self.source.tables();
        if names.is_empty() {
            return Ok(all.to_vec());
        }
        names
            .iter()
            .map(|name| {
                find_table(all, name)
                    .copied()
                    .ok_or_else(|| ReportError::NotFound(format!("statement table {name}")))
            })
            .collect()
    }

    /// Resolves identifiers into security codes.
    ///
    /// See [`SecurityResolver::resolve`].
    pub async fn resolve(
        &self,
        identifiers: &[String],
        by_sector: bool,
    ) -> Result<Vec<SecurityCode>> {
        SecurityResolver::new(self.reference.as_ref(), self.config.default_market.as_str())
            .resolve(identifiers, by_sector)
            .await
    }

    /// Downloads every (table, security) file into the staging area.
    pub async fn download(
        &self,
        securities: &[SecurityCode],
        tables: &[StatementTable],
        overwrite: bool,
    ) -> RunSummary {
        let fetcher = Fetcher::new(
            self.source.as_ref(),
            &self.config.staging_root,
            self.config.min_file_bytes,
        );
        let mut summary = RunSummary::default();

        for table in tables {
            info!(table = table.name, label = table.label, "Downloading");
            for security in securities {
                summary.total += 1;
                match fetcher.fetch(security, table, overwrite).await {
                    FetchOutcome::Staged(_) => summary.succeeded += 1,
                    FetchOutcome::Skipped(_) => summary.skipped += 1,
                    FetchOutcome::Failed(reason) => summary.fail(Some(security), table, reason),
                }
            }
        }

        summary
    }

    /// Normalizes staged files and loads them into the store.
    ///
    /// With [`LoadMode::Replace`] every selected table is dropped and
    /// recreated before the first insert. Each (security, table) pair is then
    /// one batch: a malformed file or a failed insert skips that pair only.
    ///
    /// # Errors
    /// Returns an error only if the destination tables cannot be prepared.
    pub async fn import(
        &self,
        securities: &[SecurityCode],
        tables: &[StatementTable],
        mode: LoadMode,
    ) -> Result<RunSummary> {
        self.store.prepare_tables(tables, mode).await?;
        let mut summary = RunSummary::default();

        for table in tables {
            info!(table = table.name, label = table.label, ?mode, "Importing");
            for security in securities {
                summary.total += 1;
                let path = staged_path(&self.config.staging_root, security, table);
                if !path.exists() {
                    debug!(security = %security, table = table.name, "Nothing staged");
                    summary.skipped += 1;
                    continue;
                }

                let records = match self.normalize(security, table) {
                    Ok(records) => records,
                    Err(e) => {
                        summary.fail(Some(security), table, e.to_string());
                        continue;
                    }
                };

                match self.store.insert_batch(table, &records).await {
                    Ok(rows) => {
                        debug!(security = %security, table = table.name, rows, "Loaded");
                        summary.succeeded += 1;
                    }
                    Err(e) => summary.fail(Some(security), table, e.to_string()),
                }
            }
        }

        Ok(summary)
    }

    /// Builds the pivot view of every selected table.
    pub async fn build_views(
        &self,
        tables: &[StatementTable],
        discovery: ColumnDiscovery,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for table in tables {
            summary.total += 1;
            let result = match self.discover_items(table, discovery).await {
                Ok(items) => self.store.create_view(table, &items).await.map(|()| items.len()),
                Err(e) => Err(e),
            };

            match result {
                Ok(columns) => {
                    info!(view = %table.view_name(), columns, "Built view");
                    summary.succeeded += 1;
                }
                Err(e) => summary.fail(None, table, e.to_string()),
            }
        }

        summary
    }

    /// Discovers the ordered, distinct line-item names of a table.
    ///
    /// # Errors
    /// Returns [`ReportError::ViewGeneration`] if the representative file is
    /// missing or malformed.
    pub async fn discover_items(
        &self,
        table: &StatementTable,
        discovery: ColumnDiscovery,
    ) -> Result<Vec<String>> {
        match discovery {
            ColumnDiscovery::LoadedTable => self.store.item_names(table).await,
            ColumnDiscovery::Representative => {
                let representative = &self.config.representative_security;
                let path = staged_path(&self.config.staging_root, representative, table);
                if !path.exists() {
                    return Err(ReportError::ViewGeneration {
                        table: table.name.to_string(),
                        reason: format!("representative file {} is missing", path.display()),
                    });
                }

                let records =
                    self.normalize(representative, table)
                        .map_err(|e| ReportError::ViewGeneration {
                            table: table.name.to_string(),
                            reason: e.to_string(),
                        })?;

                let mut seen = HashSet::new();
                Ok(records
                    .into_iter()
                    .filter(|r| seen.insert(r.item.clone()))
                    .map(|r| r.item)
                    .collect())
            }
        }
    }

    /// Reads the pivot view of a table back, optionally for one security.
    ///
    /// # Errors
    /// Returns an error if the table is unknown or its view has not been built.
    pub async fn view(&self, table: &str, security: Option<&SecurityCode>) -> Result<DataFrame> {
        let table = self.tables(&[table.to_string()])?.remove(0);
        self.store.view_frame(&table, security).await
    }

    fn normalize(
        &self,
        security: &SecurityCode,
        table: &StatementTable,
    ) -> Result<Vec<NormalizedRecord>> {
        let path = staged_path(&self.config.staging_root, security, table);
        self.source
            .format()
            .normalize(&path, security)?
            .collect()
    }
}
