//! Pipeline configuration.

use finreport_core::{ReportError, Result, SecurityCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings shared by every pipeline command.
///
/// Every field has a default, so a config file only needs the values it
/// overrides:
///
/// ```toml
/// database = "/srv/finance/finance.db"
/// staging_root = "/srv/finance/staging"
/// encoding = "gb18030"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SQLite database holding reference data and statement tables.
    pub database: PathBuf,
    /// Root directory of staged statement files.
    pub staging_root: PathBuf,
    /// Market listed when no identifiers are given.
    pub default_market: String,
    /// Security whose staged files define the pivot view columns.
    pub representative_security: SecurityCode,
    /// Text encoding of staged files (WHATWG label).
    pub encoding: String,
    /// Downloads smaller than this are treated as error pages.
    pub min_file_bytes: u64,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Optional request timeout; the transport default applies when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("finance.db"),
            staging_root: PathBuf::from("data/finance"),
            default_market: "sh".to_string(),
            representative_security: SecurityCode::new("sh600000"),
            encoding: "gbk".to_string(),
            min_file_bytes: 64,
            user_agent: concat!("finreport/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Loads a configuration file in TOML format.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    /// Returns [`ReportError::Config`] if the text is not a valid configuration.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ReportError::Config(e.to_string()))
    }

    /// Returns the request timeout, if one is configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.encoding, "gbk");
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_partial_override() {
        let config = PipelineConfig::from_toml_str(
            r#"
            staging_root = "/tmp/staging"
            representative_security = "SZ000001"
            timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.staging_root, PathBuf::from("/tmp/staging"));
        assert_eq!(config.representative_security.as_str(), "sz000001");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.default_market, "sh");
    }

    #[test]
    fn test_invalid_config() {
        let err = PipelineConfig::from_toml_str("min_file_bytes = \"many\"").unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
    }
}
