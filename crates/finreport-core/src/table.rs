//! Statement table descriptors and load modes.
//!
//! A [`StatementTable`] names one kind of financial statement a source can
//! serve: where to download it, where to stage it, and which destination table
//! it loads into. Sources expose their descriptors as a static, ordered slice.

use serde::{Deserialize, Serialize};

use crate::types::SecurityCode;

/// Placeholder replaced by a security's numeric suffix in URL templates.
pub const CODE_PLACEHOLDER: &str = "{code}";

/// Descriptor of one financial statement kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StatementTable {
    /// Destination table name in the store.
    pub name: &'static str,
    /// Base name of the staged file (without extension).
    pub file: &'static str,
    /// Human readable label.
    pub label: &'static str,
    /// Source URL template containing [`CODE_PLACEHOLDER`].
    pub url_template: &'static str,
}

impl StatementTable {
    /// Returns the download URL for a security.
    #[must_use]
    pub fn url_for(&self, security: &SecurityCode) -> String {
        self.url_template
            .replace(CODE_PLACEHOLDER, security.numeric_suffix())
    }

    /// Returns the staged file name, e.g. `lrb.csv`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.file)
    }

    /// Returns the name of the derived pivot view.
    #[must_use]
    pub fn view_name(&self) -> String {
        format!("{}_view", self.name)
    }
}

/// Looks up a descriptor by destination table name or staged file base name.
#[must_use]
pub fn find_table<'a>(tables: &'a [StatementTable], name: &str) -> Option<&'a StatementTable> {
    tables.iter().find(|t| t.name == name || t.file == name)
}

/// How records are written to a destination table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadMode {
    /// Drop and recreate the table before loading.
    #[default]
    Replace,
    /// Keep existing rows and append.
    Append,
}
