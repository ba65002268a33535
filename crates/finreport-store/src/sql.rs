//! SQL text generation for destination tables and pivot views.
//!
//! Table and item names are embedded directly in DDL, so every name goes
//! through [`quote_ident`] or [`quote_literal`]. The DDL is executed without
//! bound parameters; characters such as `%` or `?` inside quotes are plain text.

use finreport_core::StatementTable;

/// Quotes an SQL identifier, doubling embedded double quotes.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes an SQL string literal, doubling embedded single quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// DDL creating a destination table and its lookup index.
#[must_use]
pub fn create_table_sql(table: &StatementTable, if_not_exists: bool) -> String {
    let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
    let name = quote_ident(table.name);
    let index = quote_ident(&format!("idx_{}_security_period", table.name));
    format!(
        "CREATE TABLE {guard}{name} (
            security_code TEXT NOT NULL,
            period TEXT NOT NULL,
            item_name TEXT NOT NULL,
            value REAL
        );
        CREATE INDEX {guard}{index} ON {name}(security_code, period);"
    )
}

/// DDL dropping a destination table together with its view.
#[must_use]
pub fn drop_table_sql(table: &StatementTable) -> String {
    format!(
        "DROP VIEW IF EXISTS {};
        DROP TABLE IF EXISTS {};",
        quote_ident(&table.view_name()),
        quote_ident(table.name)
    )
}

/// The pivot query: one row per (security, period), one column per item.
///
/// Each `(security, period, item)` triple holds at most one value, so `MAX`
/// over the matching rows yields that value, and `NULL` when it is missing.
#[must_use]
pub fn pivot_select(table: &StatementTable, items: &[String]) -> String {
    let mut columns = vec!["security_code".to_string(), "period".to_string()];
    columns.extend(items.iter().map(|item| {
        format!(
            "MAX(CASE WHEN item_name = {} THEN value END) AS {}",
            quote_literal(item),
            quote_ident(item)
        )
    }));

    format!(
        "SELECT {} FROM {} GROUP BY security_code, period",
        columns.join(",\n       "),
        quote_ident(table.name)
    )
}

/// DDL (re)defining the pivot view of a table.
#[must_use]
pub fn create_view_sql(table: &StatementTable, items: &[String]) -> String {
    let view = quote_ident(&table.view_name());
    format!(
        "DROP VIEW IF EXISTS {view};
        CREATE VIEW {view} AS {};",
        pivot_select(table, items)
    )
}
