use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Actor, Discrepancy, DiscrepancyKind, NewDiscrepancy},
    recon_api::errors::ReconciliationError,
    traits::{DiscrepancyFilter, DiscrepancyManagement, Page, Pagination},
};

/// `DiscrepancyApi` is the review surface over the append-only discrepancy log.
pub struct DiscrepancyApi<B> {
    db: B,
}

impl<B> Debug for DiscrepancyApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DiscrepancyApi")
    }
}

impl<B> DiscrepancyApi<B>
where B: DiscrepancyManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Records an anomaly. Recording the same anomaly again returns the original record.
    pub async fn record(
        &self,
        order_ref: &str,
        kind: DiscrepancyKind,
        details: &str,
    ) -> Result<Discrepancy, ReconciliationError> {
        let (d, inserted) = self.db.record_discrepancy(NewDiscrepancy::new(order_ref, kind, details)).await?;
        if inserted {
            info!("🔍️ Discrepancy #{} ({kind}) recorded for {order_ref}", d.id);
        }
        Ok(d)
    }

    pub async fn fetch(&self, id: i64) -> Result<Discrepancy, ReconciliationError> {
        self.db.fetch_discrepancy(id).await?.ok_or(ReconciliationError::DiscrepancyNotFound(id))
    }

    pub async fn search(
        &self,
        filter: DiscrepancyFilter,
        pagination: Pagination,
    ) -> Result<Page<Discrepancy>, ReconciliationError> {
        trace!("🔍️ Searching discrepancies: {filter:?}, {pagination:?}");
        let page = self.db.search_discrepancies(filter, pagination).await?;
        Ok(page)
    }

    /// Marks a discrepancy as resolved. This is the only way a recorded discrepancy ever changes.
    pub async fn resolve(&self, id: i64, actor: &Actor, note: &str) -> Result<Discrepancy, ReconciliationError> {
        if note.trim().is_empty() {
            return Err(ReconciliationError::InvalidEvent("A resolution note is required".into()));
        }
        let d = self.db.resolve_discrepancy(id, &actor.to_string(), note.trim()).await?;
        info!("🔍️ Discrepancy #{id} resolved by {actor}");
        Ok(d)
    }
}
