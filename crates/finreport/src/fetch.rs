//! Staging of raw statement files.

use finreport_core::{SecurityCode, StatementSource, StatementTable};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of fetching one (security, table) file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file was downloaded to the given path.
    Staged(PathBuf),
    /// The file already existed and was left untouched.
    Skipped(PathBuf),
    /// The download failed; no file was left behind.
    Failed(String),
}

/// Returns the staged file path `<root>/<security>/<file>.csv`.
#[must_use]
pub fn staged_path(root: &Path, security: &SecurityCode, table: &StatementTable) -> PathBuf {
    root.join(security.as_str()).join(table.file_name())
}

/// Downloads statement files into the staging area.
///
/// Staged files are a durable cache: an existing file is never fetched again
/// unless overwrite is requested, regardless of its age.
pub struct Fetcher<'a> {
    source: &'a dyn StatementSource,
    staging_root: &'a Path,
    min_file_bytes: u64,
}

impl std::fmt::Debug for Fetcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("source", &self.source.name())
            .field("staging_root", &self.staging_root)
            .field("min_file_bytes", &self.min_file_bytes)
            .finish()
    }
}

impl<'a> Fetcher<'a> {
    /// Creates a fetcher writing below `staging_root`.
    ///
    /// Downloads smaller than `min_file_bytes` are discarded as error pages.
    pub fn new(
        source: &'a dyn StatementSource,
        staging_root: &'a Path,
        min_file_bytes: u64,
    ) -> Self {
        Self {
            source,
            staging_root,
            min_file_bytes,
        }
    }

    /// Fetches one file, issuing at most one request.
    pub async fn fetch(
        &self,
        security: &SecurityCode,
        table: &StatementTable,
        overwrite: bool,
    ) -> FetchOutcome {
        let path = staged_path(self.staging_root, security, table);

        if !overwrite && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(security = %security, table = table.name, "Already staged, skipping");
            return FetchOutcome::Skipped(path);
        }

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return FetchOutcome::Failed(format!("{}: {}", parent.display(), e));
            }
        }

        let url = table.url_for(security);
        let reason = match self.source.download(&url, &path).await {
            Ok(_) => match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.len() >= self.min_file_bytes => {
                    debug!(
                        security = %security,
                        table = table.name,
                        bytes = meta.len(),
                        "Staged statement file"
                    );
                    return FetchOutcome::Staged(path);
                }
                Ok(meta) => format!("response too small ({} bytes) from {}", meta.len(), url),
                Err(e) => format!("{}: {}", path.display(), e),
            },
            Err(e) => e.to_string(),
        };

        discard(&path).await;
        FetchOutcome::Failed(reason)
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial download"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use finreport_core::{RecordStream, ReportError, Result, TableFormat};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TABLE: StatementTable = StatementTable {
        name: "income_statement",
        file: "lrb",
        label: "Income statement",
        url_template: "http://example.com/lrb_{code}.html",
    };

    static TABLES: [StatementTable; 1] = [TABLE];

    #[derive(Debug)]
    struct NoFormat;

    impl TableFormat for NoFormat {
        fn name(&self) -> &str {
            "none"
        }

        fn normalize(&self, _path: &Path, _security: &SecurityCode) -> Result<RecordStream> {
            Ok(Box::new(std::iter::empty()))
        }
    }

    /// Writes a fixed body for every request and counts calls.
    #[derive(Debug)]
    struct CannedSource {
        body: Option<&'static [u8]>,
        calls: AtomicUsize,
        format: NoFormat,
    }

    impl CannedSource {
        fn new(body: Option<&'static [u8]>) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
                format: NoFormat,
            }
        }
    }

    #[async_trait]
    impl StatementSource for CannedSource {
        fn name(&self) -> &str {
            "canned"
        }

        fn description(&self) -> &str {
            "fixed responses"
        }

        fn tables(&self) -> &[StatementTable] {
            &TABLES
        }

        fn format(&self) -> &dyn TableFormat {
            &self.format
        }

        async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(url.ends_with("lrb_600000.html"));
            match self.body {
                Some(body) => {
                    std::fs::write(dest, body).map_err(|e| ReportError::io(dest, e))?;
                    Ok(body.len() as u64)
                }
                None => {
                    std::fs::write(dest, b"partial").map_err(|e| ReportError::io(dest, e))?;
                    Err(ReportError::Network("connection reset".to_string()))
                }
            }
        }
    }

    const BODY: &[u8] = b"report-date,2023-12-31,2022-12-31\nrevenue,1,2\nprofit,3,4\nmore,5,6\n";

    #[tokio::test]
    async fn test_second_fetch_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = CannedSource::new(Some(BODY));
        let fetcher = Fetcher::new(&source, dir.path(), 16);
        let code = SecurityCode::new("sh600000");

        let first = fetcher.fetch(&code, &TABLE, false).await;
        let expected = dir.path().join("sh600000").join("lrb.csv");
        assert_eq!(first, FetchOutcome::Staged(expected.clone()));

        let second = fetcher.fetch(&code, &TABLE, false).await;
        assert_eq!(second, FetchOutcome::Skipped(expected));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overwrite_fetches_again() {
        let dir = tempfile::tempdir().unwrap();
        let source = CannedSource::new(Some(BODY));
        let fetcher = Fetcher::new(&source, dir.path(), 16);
        let code = SecurityCode::new("sh600000");

        fetcher.fetch(&code, &TABLE, false).await;
        let again = fetcher.fetch(&code, &TABLE, true).await;
        assert!(matches!(again, FetchOutcome::Staged(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tiny_response_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let source = CannedSource::new(Some(b"{}"));
        let fetcher = Fetcher::new(&source, dir.path(), 16);
        let code = SecurityCode::new("sh600000");

        let outcome = fetcher.fetch(&code, &TABLE, false).await;
        assert!(matches!(outcome, FetchOutcome::Failed(ref reason) if reason.contains("2 bytes")));
        assert!(!staged_path(dir.path(), &code, &TABLE).exists());

        // Nothing was cached, so the next run tries again.
        fetcher.fetch(&code, &TABLE, false).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_error_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = CannedSource::new(None);
        let fetcher = Fetcher::new(&source, dir.path(), 16);
        let code = SecurityCode::new("sh600000");

        let outcome = fetcher.fetch(&code, &TABLE, false).await;
        assert!(matches!(outcome, FetchOutcome::Failed(ref reason) if reason.contains("reset")));
        assert!(!staged_path(dir.path(), &code, &TABLE).exists());
    }
}
