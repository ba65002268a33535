//! SQLite-based store implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use finreport_core::{
    LoadMode, NormalizedRecord, ReferenceData, ReferenceSnapshot, ReportError, ReportStore,
    Result, Security, SecurityCode, Sector, StatementTable,
};
use polars::prelude::*;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

use crate::sql;

const STOCK_COLUMNS: &str =
    "mcode, name, abbr, date, zgb, ltgb, ltgb_percent, plate_codes, market_code";
const PLATE_COLUMNS: &str = "code, name, plate_category, plate_category_name, stock_mcodes";

/// SQLite store for statement tables and reference data.
///
/// One connection is held behind a mutex. Every operation locks it for its
/// own duration and runs inside a transaction that rolls back if the
/// operation returns early.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| ReportError::Store(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| ReportError::Store(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReportError::Store(e.to_string()))
    }

    /// Initialize the reference data schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS market (
                code TEXT PRIMARY KEY,
                name TEXT
            );
            CREATE TABLE IF NOT EXISTS stock (
                mcode TEXT PRIMARY KEY,
                name TEXT,
                abbr TEXT,
                date TEXT,
                zgb REAL,
                ltgb REAL,
                ltgb_percent REAL,
                plate_codes TEXT,
                market_code TEXT REFERENCES market(code)
            );
            CREATE INDEX IF NOT EXISTS idx_stock_market ON stock(market_code);
            CREATE TABLE IF NOT EXISTS plate (
                plate_category TEXT,
                plate_category_name TEXT,
                code TEXT PRIMARY KEY,
                name TEXT,
                stock_mcodes TEXT
            );",
        )
        .map_err(|e| ReportError::Store(e.to_string()))?;

        debug!("SQLite reference schema initialized");
        Ok(())
    }

    /// Writes markets, securities and sectors, replacing entries with the same code.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns an error if any write fails; nothing is written in that case.
    #[instrument(skip(self, snapshot))]
    pub fn import_reference(&self, snapshot: &ReferenceSnapshot) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| ReportError::Store(e.to_string()))?;

        let mut written = 0usize;
        for market in &snapshot.markets {
            written += tx
                .execute(
                    "INSERT OR REPLACE INTO market (code, name) VALUES (?1, ?2)",
                    params![market.code, market.name],
                )
                .map_err(|e| ReportError::Store(e.to_string()))?;
        }

        for security in &snapshot.securities {
            written += tx
                .execute(
                    &format!(
                        "INSERT OR REPLACE INTO stock ({STOCK_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                    ),
                    params![
                        security.code.as_str(),
                        security.name,
                        security.abbr,
                        security.listed.map(|d| d.to_string()),
                        security.total_shares,
                        security.float_shares,
                        security.float_ratio,
                        security.sectors.join(","),
                        security.market,
                    ],
                )
                .map_err(|e| ReportError::Store(e.to_string()))?;
        }

        for sector in &snapshot.sectors {
            let members: Vec<&str> = sector.members.iter().map(SecurityCode::as_str).collect();
            written += tx
                .execute(
                    &format!("INSERT OR REPLACE INTO plate ({PLATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                    params![
                        sector.code,
                        sector.name,
                        sector.category,
                        sector.category_name,
                        members.join(","),
                    ],
                )
                .map_err(|e| ReportError::Store(e.to_string()))?;
        }

        tx.commit().map_err(|e| ReportError::Store(e.to_string()))?;
        info!(rows = written, "Imported reference data");
        Ok(written)
    }

    fn frame(
        conn: &Connection,
        query: &str,
        security: Option<&SecurityCode>,
    ) -> Result<DataFrame> {
        let mut stmt = conn
            .prepare(query)
            .map_err(|e| ReportError::Store(e.to_string()))?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let value_columns = names.len().saturating_sub(2);

        let mut securities: Vec<String> = Vec::new();
        let mut periods: Vec<String> = Vec::new();
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); value_columns];

        let mut rows = match security {
            Some(code) => stmt.query(params![code.as_str()]),
            None => stmt.query([]),
        }
        .map_err(|e| ReportError::Store(e.to_string()))?;

        while let Some(row) = rows.next().map_err(|e| ReportError::Store(e.to_string()))? {
            securities.push(row.get(0).map_err(|e| ReportError::Store(e.to_string()))?);
            periods.push(row.get(1).map_err(|e| ReportError::Store(e.to_string()))?);
            for (i, column) in values.iter_mut().enumerate() {
                column.push(
                    row.get::<_, Option<f64>>(i + 2)
                        .map_err(|e| ReportError::Store(e.to_string()))?,
                );
            }
        }

        let mut columns = vec![
            Column::new(names[0].as_str().into(), securities),
            Column::new(names[1].as_str().into(), periods),
        ];
        for (name, column) in names[2..].iter().zip(values) {
            columns.push(Column::new(name.as_str().into(), column));
        }

        DataFrame::new(columns).map_err(|e| ReportError::Store(e.to_string()))
    }

    fn security_from_row(row: &Row<'_>) -> rusqlite::Result<Security> {
        let date: Option<String> = row.get(3)?;
        let sectors: Option<String> = row.get(7)?;
        Ok(Security {
            code: SecurityCode::new(row.get::<_, String>(0)?),
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            abbr: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            listed: date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            total_shares: row.get(4)?,
            float_shares: row.get(5)?,
            float_ratio: row.get(6)?,
            sectors: split_list(sectors.as_deref()),
            market: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        })
    }

    fn sector_from_row(row: &Row<'_>) -> rusqlite::Result<Sector> {
        let members: Option<String> = row.get(4)?;
        Ok(Sector {
            code: row.get(0)?,
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            category: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            category_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            members: split_list(members.as_deref())
                .into_iter()
                .map(SecurityCode::new)
                .collect(),
        })
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ReportStore for SqliteStore {
    #[instrument(skip(self, tables), fields(tables = tables.len()))]
    async fn prepare_tables(&self, tables: &[StatementTable], mode: LoadMode) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| ReportError::Store(e.to_string()))?;

        for table in tables {
            let ddl = match mode {
                LoadMode::Replace => format!(
                    "{}\n{}",
                    sql::drop_table_sql(table),
                    sql::create_table_sql(table, false)
                ),
                LoadMode::Append => sql::create_table_sql(table, true),
            };
            tx.execute_batch(&ddl)
                .map_err(|e| ReportError::Store(format!("{}: {}", table.name, e)))?;
        }

        tx.commit().map_err(|e| ReportError::Store(e.to_string()))?;
        debug!(?mode, "Prepared destination tables");
        Ok(())
    }

    #[instrument(skip(self, records), fields(table = table.name, rows = records.len()))]
    async fn insert_batch(
        &self,
        table: &StatementTable,
        records: &[NormalizedRecord],
    ) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| ReportError::Store(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {} (security_code, period, item_name, value)
                     VALUES (?1, ?2, ?3, ?4)",
                    sql::quote_ident(table.name)
                ))
                .map_err(|e| ReportError::Store(e.to_string()))?;

            for record in records {
                stmt.execute(params![
                    record.security.as_str(),
                    record.period,
                    record.item,
                    record.value
                ])
                .map_err(|e| ReportError::Store(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| ReportError::Store(e.to_string()))?;
        debug!("Inserted batch");
        Ok(records.len())
    }

    #[instrument(skip(self), fields(table = table.name))]
    async fn item_names(&self, table: &StatementTable) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT item_name FROM {} GROUP BY item_name ORDER BY MIN(rowid)",
                sql::quote_ident(table.name)
            ))
            .map_err(|e| ReportError::Store(e.to_string()))?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| ReportError::Store(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ReportError::Store(e.to_string()))?;

        Ok(names)
    }

    #[instrument(skip(self, items), fields(table = table.name, columns = items.len()))]
    async fn create_view(&self, table: &StatementTable, items: &[String]) -> Result<()> {
        if items.is_empty() {
            return Err(ReportError::ViewGeneration {
                table: table.name.to_string(),
                reason: "no line items discovered".to_string(),
            });
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| ReportError::Store(e.to_string()))?;
        tx.execute_batch(&sql::create_view_sql(table, items))
            .map_err(|e| ReportError::ViewGeneration {
                table: table.name.to_string(),
                reason: e.to_string(),
            })?;
        tx.commit().map_err(|e| ReportError::Store(e.to_string()))?;

        debug!(view = %table.view_name(), "Created pivot view");
        Ok(())
    }

    #[instrument(skip(self), fields(table = table.name))]
    async fn table_frame(
        &self,
        table: &StatementTable,
        security: Option<&SecurityCode>,
    ) -> Result<DataFrame> {
        let filter = if security.is_some() {
            " WHERE security_code = ?1"
        } else {
            ""
        };
        let query = format!(
            "SELECT security_code, period, item_name, value FROM {}{filter} ORDER BY rowid",
            sql::quote_ident(table.name)
        );

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&query)
            .map_err(|e| ReportError::Store(e.to_string()))?;

        let mut securities = Vec::new();
        let mut periods = Vec::new();
        let mut items = Vec::new();
        let mut values: Vec<Option<f64>> = Vec::new();

        let mut rows = match security {
            Some(code) => stmt.query(params![code.as_str()]),
            None => stmt.query([]),
        }
        .map_err(|e| ReportError::Store(e.to_string()))?;

        while let Some(row) = rows.next().map_err(|e| ReportError::Store(e.to_string()))? {
            let read = |i: usize| row.get::<_, String>(i);
            securities.push(read(0).map_err(|e| ReportError::Store(e.to_string()))?);
            periods.push(read(1).map_err(|e| ReportError::Store(e.to_string()))?);
            items.push(read(2).map_err(|e| ReportError::Store(e.to_string()))?);
            values.push(row.get(3).map_err(|e| ReportError::Store(e.to_string()))?);
        }

        debug!("Read {} rows", values.len());

        DataFrame::new(vec![
            Column::new("security_code".into(), securities),
            Column::new("period".into(), periods),
            Column::new("item_name".into(), items),
            Column::new("value".into(), values),
        ])
        .map_err(|e| ReportError::Store(e.to_string()))
    }

    #[instrument(skip(self), fields(table = table.name))]
    async fn view_frame(
        &self,
        table: &StatementTable,
        security: Option<&SecurityCode>,
    ) -> Result<DataFrame> {
        let filter = if security.is_some() {
            " WHERE security_code = ?1"
        } else {
            ""
        };
        let query = format!(
            "SELECT * FROM {}{filter} ORDER BY security_code, period",
            sql::quote_ident(&table.view_name())
        );

        let conn = self.lock()?;
        Self::frame(&conn, &query, security)
    }
}

#[async_trait]
impl ReferenceData for SqliteStore {
    #[instrument(skip(self), fields(security = %code))]
    async fn security(&self, code: &SecurityCode) -> Result<Option<Security>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {STOCK_COLUMNS} FROM stock WHERE mcode = ?1"),
            params![code.as_str()],
            Self::security_from_row,
        )
        .optional()
        .map_err(|e| ReportError::Store(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn sector(&self, code: &str) -> Result<Option<Sector>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {PLATE_COLUMNS} FROM plate WHERE code = ?1"),
            params![code],
            Self::sector_from_row,
        )
        .optional()
        .map_err(|e| ReportError::Store(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn market_securities(&self, market: &str) -> Result<Vec<Security>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {STOCK_COLUMNS} FROM stock WHERE market_code = ?1 ORDER BY rowid"
            ))
            .map_err(|e| ReportError::Store(e.to_string()))?;

        let securities = stmt
            .query_map(params![market], Self::security_from_row)
            .map_err(|e| ReportError::Store(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ReportError::Store(e.to_string()))?;

        debug!(count = securities.len(), "Listed market securities");
        Ok(securities)
    }
}
