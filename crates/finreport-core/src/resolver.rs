//! Resolution of user-supplied identifiers into security codes.

use tracing::debug;

use crate::{error::Result, provider::ReferenceData, types::SecurityCode};

/// Turns security or sector identifiers into the ordered list of securities to process.
///
/// Resolution is lenient: identifiers that do not match any reference entry
/// contribute nothing and are not reported as errors.
pub struct SecurityResolver<'a> {
    reference: &'a dyn ReferenceData,
    default_market: String,
}

impl std::fmt::Debug for SecurityResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityResolver")
            .field("default_market", &self.default_market)
            .finish_non_exhaustive()
    }
}

impl<'a> SecurityResolver<'a> {
    /// Creates a resolver over a reference source.
    ///
    /// `default_market` is used when no identifiers are given.
    pub fn new(reference: &'a dyn ReferenceData, default_market: impl Into<String>) -> Self {
        Self {
            reference,
            default_market: default_market.into(),
        }
    }

    /// Resolves identifiers into security codes.
    ///
    /// - `by_sector`: each identifier is a sector code; member lists are
    ///   concatenated in input order without de-duplication.
    /// - otherwise each identifier is a security code; unknown codes are dropped.
    /// - with no identifiers, every security of the default market is returned.
    pub async fn resolve(
        &self,
        identifiers: &[String],
        by_sector: bool,
    ) -> Result<Vec<SecurityCode>> {
        let mut codes = Vec::new();

        if by_sector {
            for id in identifiers {
                match self.reference.sector(id.trim()).await? {
                    Some(sector) => codes.extend(sector.members),
                    None => debug!(sector = %id, "Unknown sector, skipping"),
                }
            }
        } else if !identifiers.is_empty() {
            for id in identifiers {
                let code = SecurityCode::new(id.as_str());
                match self.reference.security(&code).await? {
                    Some(security) => codes.push(security.code),
                    None => debug!(security = %code, "Unknown security, skipping"),
                }
            }
        } else {
            codes = self
                .reference
                .market_securities(&self.default_market)
                .await?
                .into_iter()
                .map(|s| s.code)
                .collect();
        }

        debug!(count = codes.len(), "Resolved securities");
        Ok(codes)
    }
}
