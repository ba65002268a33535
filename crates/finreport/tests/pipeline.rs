//! End-to-end pipeline runs against a canned statement source.

#![cfg(all(feature = "netease", feature = "sqlite"))]

use async_trait::async_trait;
use encoding_rs::GBK;
use finreport::{
    ColumnDiscovery, InMemoryReference, LoadMode, MarkerColumnFormat, PipelineConfig,
    ReportError, ReportPipeline, ReportStore, Result, Security, SecurityCode, Sector,
    SqliteStore, StatementSource, StatementTable, TableFormat, staged_path,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

static TABLES: [StatementTable; 2] = [
    StatementTable {
        name: "income_statement",
        file: "lrb",
        label: "Income statement",
        url_template: "http://fake.test/lrb_{code}.html",
    },
    StatementTable {
        name: "balance_sheet",
        file: "zcfzb",
        label: "Balance sheet",
        url_template: "http://fake.test/zcfzb_{code}.html",
    },
];

const PUFA_INCOME: &str = "报告日期,2023-12-31,2022-12-31\n\
                           营业收入,100.5,90\n\
                           净利润,10,--\n\
                           毛利率(%),12.5,11\n";
const PUFA_BALANCE: &str = "报告日期,2023-12-31\n资产总计,1000\n负债合计,400\n";
const BAIYUN_INCOME: &str = "报告日期,2023-12-31\n营业收入,50\n净利润,-3\n";

/// Serves GBK-encoded bodies by URL and counts requests.
#[derive(Debug)]
struct CannedSource {
    bodies: HashMap<&'static str, &'static str>,
    format: MarkerColumnFormat,
    calls: AtomicUsize,
}

impl CannedSource {
    fn new() -> Self {
        let bodies = HashMap::from([
            ("http://fake.test/lrb_600000.html", PUFA_INCOME),
            ("http://fake.test/zcfzb_600000.html", PUFA_BALANCE),
            ("http://fake.test/lrb_600004.html", BAIYUN_INCOME),
            // An error page too small to be a statement.
            ("http://fake.test/zcfzb_600004.html", "{}"),
        ]);
        Self {
            bodies,
            format: MarkerColumnFormat::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StatementSource for CannedSource {
    fn name(&self) -> &str {
        "canned"
    }

    fn description(&self) -> &str {
        "canned statement files"
    }

    fn tables(&self) -> &[StatementTable] {
        &TABLES
    }

    fn format(&self) -> &dyn TableFormat {
        &self.format
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .get(url)
            .ok_or_else(|| ReportError::Network(format!("404 for {url}")))?;
        let (bytes, _, _) = GBK.encode(body);
        std::fs::write(dest, &bytes).map_err(|e| ReportError::io(dest, e))?;
        Ok(bytes.len() as u64)
    }
}

struct Harness {
    pipeline: ReportPipeline,
    source: Arc<CannedSource>,
    store: Arc<SqliteStore>,
    _staging: tempfile::TempDir,
}

async fn harness() -> Harness {
    let staging = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        staging_root: staging.path().to_path_buf(),
        min_file_bytes: 16,
        ..PipelineConfig::default()
    };

    let reference = InMemoryReference::new();
    reference
        .put_security(Security::new("sh600000", "浦发银行", "sh").with_sectors(vec!["881155".into()]))
        .await;
    reference
        .put_security(Security::new("sh600004", "白云机场", "sh"))
        .await;
    reference
        .put_sector(Sector {
            code: "881155".to_string(),
            name: "银行".to_string(),
            category: "hy".to_string(),
            category_name: "行业".to_string(),
            members: vec![SecurityCode::new("sh600000")],
        })
        .await;

    let source = Arc::new(CannedSource::new());
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let pipeline = ReportPipeline::new(source.clone(), store.clone(), Arc::new(reference), config);

    Harness {
        pipeline,
        source,
        store,
        _staging: staging,
    }
}

#[tokio::test]
async fn test_resolve_market_and_sector() {
    let h = harness().await;

    let market = h.pipeline.resolve(&[], false).await.unwrap();
    assert_eq!(market, vec![SecurityCode::new("sh600000"), SecurityCode::new("sh600004")]);

    let sector = h.pipeline.resolve(&["881155".to_string()], true).await.unwrap();
    assert_eq!(sector, vec![SecurityCode::new("sh600000")]);

    let explicit = h
        .pipeline
        .resolve(&["SH600004".to_string(), "sh999999".to_string()], false)
        .await
        .unwrap();
    assert_eq!(explicit, vec![SecurityCode::new("sh600004")]);
}

#[tokio::test]
async fn test_table_selection() {
    let h = harness().await;
    assert_eq!(h.pipeline.tables(&[]).unwrap().len(), 2);

    let picked = h.pipeline.tables(&["zcfzb".to_string()]).unwrap();
    assert_eq!(picked[0].name, "balance_sheet");

    let err = h.pipeline.tables(&["no_such_table".to_string()]).unwrap_err();
    assert!(matches!(err, ReportError::NotFound(_)));
}

#[tokio::test]
async fn test_download_is_resumable() {
    let h = harness().await;
    let securities = h.pipeline.resolve(&[], false).await.unwrap();

    let first = h.pipeline.download(&securities, &TABLES, false).await;
    assert_eq!(first.total, 4);
    assert_eq!(first.succeeded, 3);
    assert_eq!(first.failed.len(), 1);
    assert_eq!(first.failed[0].table, "balance_sheet");
    assert_eq!(first.failed[0].security, Some(SecurityCode::new("sh600004")));
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 4);

    // Staged files are reused; only the failed item is requested again.
    let second = h.pipeline.download(&securities, &TABLES, false).await;
    assert_eq!(second.skipped, 3);
    assert_eq!(second.failed.len(), 1);
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_full_run_pivot_matches_rows() {
    let h = harness().await;
    let securities = h.pipeline.resolve(&[], false).await.unwrap();

    h.pipeline.download(&securities, &TABLES, false).await;
    let imported = h
        .pipeline
        .import(&securities, &TABLES, LoadMode::Replace)
        .await
        .unwrap();
    assert_eq!(imported.total, 4);
    assert_eq!(imported.succeeded, 3);
    assert_eq!(imported.skipped, 1);
    assert!(imported.failed.is_empty());

    let views = h
        .pipeline
        .build_views(&TABLES, ColumnDiscovery::Representative)
        .await;
    assert_eq!(views.succeeded, 2);

    let income = &TABLES[0];
    let rows = h.store.table_frame(income, None).await.unwrap();
    assert_eq!(rows.height(), 8);
    let view = h.store.view_frame(income, None).await.unwrap();
    assert_eq!(view.height(), 3);

    let securities = rows.column("security_code").unwrap().str().unwrap();
    let periods = rows.column("period").unwrap().str().unwrap();
    let items = rows.column("item_name").unwrap().str().unwrap();
    let values = rows.column("value").unwrap().f64().unwrap();
    let view_securities = view.column("security_code").unwrap().str().unwrap();
    let view_periods = view.column("period").unwrap().str().unwrap();

    for i in 0..rows.height() {
        let row = (0..view.height())
            .find(|&j| {
                view_securities.get(j) == securities.get(i) && view_periods.get(j) == periods.get(i)
            })
            .unwrap();
        let column = view.column(items.get(i).unwrap()).unwrap().f64().unwrap();
        assert_eq!(column.get(row), values.get(i));
    }

    let baiyun = h
        .pipeline
        .view("lrb", Some(&SecurityCode::new("sh600004")))
        .await
        .unwrap();
    assert_eq!(baiyun.height(), 1);
    let profit = baiyun.column("净利润").unwrap().f64().unwrap();
    assert_eq!(profit.get(0), Some(-3.0));
    let margin = baiyun.column("毛利率(%)").unwrap().f64().unwrap();
    assert_eq!(margin.get(0), None);
}

#[tokio::test]
async fn test_malformed_file_does_not_stop_import() {
    let h = harness().await;
    let securities = h.pipeline.resolve(&[], false).await.unwrap();
    h.pipeline.download(&securities, &TABLES, false).await;

    let broken = staged_path(
        &h.pipeline.config().staging_root,
        &SecurityCode::new("sh600004"),
        &TABLES[1],
    );
    let (bytes, _, _) = GBK.encode("科目,2023-12-31\n资产总计,1\n");
    std::fs::write(&broken, &bytes).unwrap();

    let summary = h
        .pipeline
        .import(&securities, &TABLES, LoadMode::Replace)
        .await
        .unwrap();
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].reason.contains("report-date"));

    let balance = h.store.table_frame(&TABLES[1], None).await.unwrap();
    assert_eq!(balance.height(), 2);
}

#[tokio::test]
async fn test_append_keeps_earlier_rows() {
    let h = harness().await;
    let pufa = vec![SecurityCode::new("sh600000")];
    let income = &TABLES[..1];
    h.pipeline.download(&pufa, income, false).await;

    h.pipeline.import(&pufa, income, LoadMode::Replace).await.unwrap();
    h.pipeline.import(&pufa, income, LoadMode::Append).await.unwrap();
    let rows = h.store.table_frame(&TABLES[0], None).await.unwrap();
    assert_eq!(rows.height(), 12);

    h.pipeline.import(&pufa, income, LoadMode::Replace).await.unwrap();
    let rows = h.store.table_frame(&TABLES[0], None).await.unwrap();
    assert_eq!(rows.height(), 6);
}

#[tokio::test]
async fn test_views_need_representative_file() {
    let h = harness().await;

    let representative = h
        .pipeline
        .build_views(&TABLES, ColumnDiscovery::Representative)
        .await;
    assert_eq!(representative.failed.len(), 2);
    assert!(representative.failed.iter().all(|f| f.security.is_none()));

    let err = h
        .pipeline
        .discover_items(&TABLES[0], ColumnDiscovery::Representative)
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::ViewGeneration { .. }));
}

#[tokio::test]
async fn test_scan_all_discovers_loaded_items() {
    let h = harness().await;
    let baiyun = vec![SecurityCode::new("sh600004")];
    let income = &TABLES[..1];
    h.pipeline.download(&baiyun, income, false).await;
    h.pipeline.import(&baiyun, income, LoadMode::Replace).await.unwrap();

    let items = h
        .pipeline
        .discover_items(&TABLES[0], ColumnDiscovery::LoadedTable)
        .await
        .unwrap();
    assert_eq!(items, vec!["营业收入", "净利润"]);

    let views = h.pipeline.build_views(income, ColumnDiscovery::LoadedTable).await;
    assert_eq!(views.succeeded, 1);
}
