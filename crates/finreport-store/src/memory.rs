//! In-memory reference data implementation.

use async_trait::async_trait;
use finreport_core::{ReferenceData, ReferenceSnapshot, Result, Security, SecurityCode, Sector};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Reference data held in memory.
///
/// Securities keep their insertion order, which is the reference order used
/// when listing a market. Data is lost when the value is dropped.
#[derive(Debug, Default)]
pub struct InMemoryReference {
    securities: RwLock<Vec<Security>>,
    sectors: RwLock<HashMap<String, Sector>>,
}

impl InMemoryReference {
    /// Create a new empty reference set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reference set from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: ReferenceSnapshot) -> Self {
        let sectors = snapshot
            .sectors
            .into_iter()
            .map(|s| (s.code.clone(), s))
            .collect();
        Self {
            securities: RwLock::new(snapshot.securities),
            sectors: RwLock::new(sectors),
        }
    }

    /// Adds or replaces a security, keeping the original position on replace.
    pub async fn put_security(&self, security: Security) {
        let mut securities = self.securities.write().await;
        match securities.iter_mut().find(|s| s.code == security.code) {
            Some(existing) => *existing = security,
            None => securities.push(security),
        }
    }

    /// Adds or replaces a sector.
    pub async fn put_sector(&self, sector: Sector) {
        self.sectors.write().await.insert(sector.code.clone(), sector);
    }
}

#[async_trait]
impl ReferenceData for InMemoryReference {
    #[instrument(skip(self), fields(security = %code))]
    async fn security(&self, code: &SecurityCode) -> Result<Option<Security>> {
        let securities = self.securities.read().await;
        let found = securities.iter().find(|s| &s.code == code).cloned();
        if found.is_none() {
            debug!("Security not in reference set");
        }
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn sector(&self, code: &str) -> Result<Option<Sector>> {
        Ok(self.sectors.read().await.get(code).cloned())
    }

    #[instrument(skip(self))]
    async fn market_securities(&self, market: &str) -> Result<Vec<Security>> {
        Ok(self
            .securities
            .read()
            .await
            .iter()
            .filter(|s| s.market == market)
            .cloned()
            .collect())
    }
}
