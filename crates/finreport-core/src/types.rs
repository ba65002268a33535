//! Core data types for the report pipeline.
//!
//! This module defines the fundamental data structures:
//!
//! - [`SecurityCode`] - Exchange-prefixed security identifier
//! - [`Security`] - Security reference information
//! - [`Market`] - Exchange/market a security is listed on
//! - [`Sector`] - Sector ("plate") with its ordered member list
//! - [`ReferenceSnapshot`] - A bundle of reference data for bulk import
//! - [`NormalizedRecord`] - One long-format financial statement value

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An exchange-prefixed security code such as `sh600000`.
///
/// Codes are trimmed and lowercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SecurityCode(String);

impl SecurityCode {
    /// Creates a new code from a string, trimming and lowercasing it.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_lowercase())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the code without its market prefix (`600000` for `sh600000`).
    ///
    /// Source URLs are parameterized by this suffix.
    #[must_use]
    pub fn numeric_suffix(&self) -> &str {
        self.0.trim_start_matches(|c: char| !c.is_ascii_digit())
    }
}

impl fmt::Display for SecurityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SecurityCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for SecurityCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecurityCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<SecurityCode> for String {
    fn from(code: SecurityCode) -> Self {
        code.0
    }
}

/// Security reference information.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Security {
    /// Unique exchange-prefixed code.
    pub code: SecurityCode,
    /// Display name.
    pub name: String,
    /// Pinyin abbreviation of the name.
    #[serde(default)]
    pub abbr: String,
    /// Listing or reference date.
    #[serde(default)]
    pub listed: Option<NaiveDate>,
    /// Total share count.
    #[serde(default)]
    pub total_shares: Option<f64>,
    /// Floating (tradable) share count.
    #[serde(default)]
    pub float_shares: Option<f64>,
    /// Floating shares as a percentage of total shares.
    #[serde(default)]
    pub float_ratio: Option<f64>,
    /// Codes of the sectors this security belongs to.
    #[serde(default)]
    pub sectors: Vec<String>,
    /// Code of the market the security is listed on.
    pub market: String,
}

impl Security {
    /// Creates new security info with required fields.
    #[must_use]
    pub fn new(
        code: impl Into<SecurityCode>,
        name: impl Into<String>,
        market: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            abbr: String::new(),
            listed: None,
            total_shares: None,
            float_shares: None,
            float_ratio: None,
            sectors: Vec::new(),
            market: market.into(),
        }
    }

    /// Sets the sector memberships.
    #[must_use]
    pub fn with_sectors(mut self, sectors: Vec<String>) -> Self {
        self.sectors = sectors;
        self
    }
}

/// A market (exchange) that owns an ordered list of securities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Market code, matching the security code prefix.
    pub code: String,
    /// Display name.
    pub name: String,
}

/// A sector ("plate") grouping securities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    /// Sector code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Category code the sector belongs to.
    #[serde(default)]
    pub category: String,
    /// Category display name.
    #[serde(default)]
    pub category_name: String,
    /// Member security codes, in reference order.
    #[serde(default)]
    pub members: Vec<SecurityCode>,
}

/// Reference data bundle used for bulk import.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    /// Markets.
    #[serde(default)]
    pub markets: Vec<Market>,
    /// Securities, in reference order.
    #[serde(default)]
    pub securities: Vec<Security>,
    /// Sectors.
    #[serde(default)]
    pub sectors: Vec<Sector>,
}

/// One value of a financial statement in long format.
///
/// A missing or placeholder cell is represented by `value: None`, never by zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Security the value belongs to.
    pub security: SecurityCode,
    /// Period label taken from the source header (e.g. `2023-12-31`).
    pub period: String,
    /// Line-item name taken from the marker column.
    pub item: String,
    /// Parsed numeric value.
    pub value: Option<f64>,
}

impl NormalizedRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(
        security: SecurityCode,
        period: impl Into<String>,
        item: impl Into<String>,
        value: Option<f64>,
    ) -> Self {
        Self {
            security,
            period: period.into(),
            item: item.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_code_normalization() {
        let code = SecurityCode::new("  SH600000 ");
        assert_eq!(code.as_str(), "sh600000");
        assert_eq!(code.to_string(), "sh600000");
    }

    #[test]
    fn test_numeric_suffix() {
        let code = SecurityCode::new("sz000001");
        assert_eq!(code.numeric_suffix(), "000001");

        let bare = SecurityCode::new("600000");
        assert_eq!(bare.numeric_suffix(), "600000");
    }

    #[test]
    fn test_reference_snapshot_from_json() {
        let json = r#"{
            "markets": [{"code": "sh", "name": "上海证券交易所"}],
            "securities": [
                {"code": "SH600000", "name": "浦发银行", "listed": "1999-11-10", "market": "sh"}
            ],
            "sectors": [
                {"code": "881155", "name": "银行", "members": ["sh600000", "sh601398"]}
            ]
        }"#;
        let snapshot: ReferenceSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.securities[0].code.as_str(), "sh600000");
        assert_eq!(
            snapshot.securities[0].listed,
            NaiveDate::from_ymd_opt(1999, 11, 10)
        );
        assert_eq!(snapshot.sectors[0].members.len(), 2);
        assert!(snapshot.securities[0].sectors.is_empty());
    }
}
