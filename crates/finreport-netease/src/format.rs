//! Marker-column statement layout.
//!
//! NetEase statement files are "wide": the header row holds a marker label
//! (`报告日期`) followed by one column per reporting period, and every data row
//! starts with a line-item name followed by that item's value in each period.
//!
//! ```text
//! 报告日期,2023-12-31,2022-12-31
//! 主营业务收入(万元),100.5,--
//! 净利润(万元),10,5
//! ```

use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, GBK};
use finreport_core::{
    NormalizedRecord, RecordStream, ReportError, Result, SecurityCode, TableFormat,
};
use tracing::{debug, warn};

/// Header labels that identify the marker (item-name) column.
pub const DEFAULT_MARKERS: &[&str] = &["报告日期", "报告期"];

/// Parsing strategy for marker-column files.
#[derive(Debug, Clone)]
pub struct MarkerColumnFormat {
    encoding: &'static Encoding,
    markers: Vec<String>,
}

impl Default for MarkerColumnFormat {
    fn default() -> Self {
        Self {
            encoding: GBK,
            markers: DEFAULT_MARKERS.iter().map(|m| (*m).to_string()).collect(),
        }
    }
}

impl MarkerColumnFormat {
    /// Creates a format reading GBK files with the default marker labels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the text encoding by WHATWG label (e.g. `gbk`, `gb18030`, `utf-8`).
    ///
    /// # Errors
    /// Returns [`ReportError::Config`] if the label is not a known encoding.
    pub fn with_encoding_label(mut self, label: &str) -> Result<Self> {
        self.encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| ReportError::Config(format!("Unknown encoding: {label}")))?;
        Ok(self)
    }

    /// Replaces the set of marker labels.
    #[must_use]
    pub fn with_markers(mut self, markers: Vec<String>) -> Self {
        self.markers = markers;
        self
    }

    /// Returns the configured encoding.
    #[must_use]
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn is_marker(&self, label: &str) -> bool {
        self.markers.iter().any(|m| m == label)
    }
}

impl TableFormat for MarkerColumnFormat {
    fn name(&self) -> &str {
        "marker-column"
    }

    fn normalize(&self, path: &Path, security: &SecurityCode) -> Result<RecordStream> {
        let bytes = std::fs::read(path).map_err(|e| ReportError::io(path, e))?;
        let (text, used, had_errors) = self.encoding.decode(&bytes);
        if had_errors {
            warn!(
                path = %path.display(),
                encoding = used.name(),
                "Replaced undecodable bytes in staged file"
            );
        }

        let malformed = |row: usize, reason: String| ReportError::MalformedSource {
            security: security.to_string(),
            path: path.to_path_buf(),
            row,
            reason,
        };

        // Rows are taken line by line so that an empty line stays visible as
        // the end of the table; the csv reader would skip it.
        let mut lines = text
            .lines()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into_iter()
            .enumerate();

        let header = match lines.next() {
            Some((_, line)) => parse_line(&line).map_err(|e| malformed(1, e.to_string()))?,
            None => return Err(malformed(0, "file is empty".to_string())),
        };

        let mut name_column = None;
        let mut periods = Vec::new();
        for (idx, label) in header.iter().enumerate() {
            let label = clean(label);
            if self.is_marker(label) {
                name_column.get_or_insert(idx);
            } else if !label.is_empty() {
                periods.push((idx, label.to_string()));
            }
        }

        let Some(name_column) = name_column else {
            return Err(malformed(1, "header has no report-date column".to_string()));
        };

        debug!(
            security = %security,
            path = %path.display(),
            periods = periods.len(),
            "Opened marker-column file"
        );

        Ok(Box::new(MarkerRows {
            security: security.clone(),
            path: path.to_path_buf(),
            lines,
            name_column,
            periods,
            current_item: None,
            pending: Vec::new().into_iter(),
            row_number: 1,
            done: false,
        }))
    }
}

/// Lazy row-by-row reader behind [`MarkerColumnFormat::normalize`].
struct MarkerRows {
    security: SecurityCode,
    path: PathBuf,
    lines: std::iter::Enumerate<std::vec::IntoIter<String>>,
    name_column: usize,
    periods: Vec<(usize, String)>,
    current_item: Option<String>,
    pending: std::vec::IntoIter<NormalizedRecord>,
    row_number: usize,
    done: bool,
}

impl MarkerRows {
    fn malformed(&self, reason: String) -> ReportError {
        ReportError::MalformedSource {
            security: self.security.to_string(),
            path: self.path.clone(),
            row: self.row_number,
            reason,
        }
    }

    /// Converts one data row into records. `Ok(None)` marks the end of the table.
    fn process(&mut self, row: &csv::StringRecord) -> Result<Option<Vec<NormalizedRecord>>> {
        let cell = |idx: usize| row.get(idx).unwrap_or("");
        let marker = clean(cell(self.name_column));

        if marker.is_empty() {
            if self.periods.iter().all(|(idx, _)| clean(cell(*idx)).is_empty()) {
                return Ok(None);
            }
            if self.current_item.is_none() {
                return Err(self.malformed("values found before any line-item name".to_string()));
            }
        } else {
            self.current_item = Some(marker.to_string());
        }

        let item = self.current_item.clone().unwrap_or_default();
        let mut records = Vec::with_capacity(self.periods.len());
        for (idx, period) in &self.periods {
            let value = parse_cell(cell(*idx)).map_err(|reason| {
                self.malformed(format!("{reason} in column '{period}' of item '{item}'"))
            })?;
            records.push(NormalizedRecord::new(
                self.security.clone(),
                period.clone(),
                item.clone(),
                value,
            ));
        }
        Ok(Some(records))
    }
}

impl Iterator for MarkerRows {
    type Item = Result<NormalizedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.next() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }

            let Some((idx, line)) = self.lines.next() else {
                self.done = true;
                return None;
            };
            self.row_number = idx + 1;

            if line.trim().is_empty() {
                debug!(row = self.row_number, "Empty line ends table");
                self.done = true;
                return None;
            }

            let processed = match parse_line(&line) {
                Ok(row) => self.process(&row),
                Err(e) => Err(self.malformed(e.to_string())),
            };

            match processed {
                Ok(Some(records)) => self.pending = records.into_iter(),
                Ok(None) => {
                    debug!(row = self.row_number, "Blank row ends table");
                    self.done = true;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Splits one physical line into cells.
fn parse_line(line: &str) -> std::result::Result<csv::StringRecord, csv::Error> {
    let mut record = csv::StringRecord::new();
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .read_record(&mut record)?;
    Ok(record)
}

fn clean(cell: &str) -> &str {
    cell.trim_matches(char::is_whitespace)
}

/// Parses one value cell.
///
/// Blank and dash-only cells (`-`, `--`, ` - `) are missing values, never zero.
fn parse_cell(raw: &str) -> std::result::Result<Option<f64>, String> {
    let text = clean(raw);
    if text.is_empty() || text.chars().all(|c| c == '-') {
        return Ok(None);
    }
    match text.replace(',', "").parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(format!("non-numeric value '{text}'")),
    }
}
