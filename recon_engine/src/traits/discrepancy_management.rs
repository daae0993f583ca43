use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Discrepancy, NewDiscrepancy},
    traits::{
        data_objects::{Page, Pagination},
        StoreError,
    },
};

/// Append-only storage of anomalies that need a human to look at them.
///
/// Records are never edited after insertion, except to mark them as resolved.
#[allow(async_fn_in_trait)]
pub trait DiscrepancyManagement {
    /// Records a discrepancy. If a discrepancy with the same fingerprint already exists, the existing record is
    /// returned and nothing is written.
    ///
    /// Returns the record, and `true` if it was newly inserted.
    async fn record_discrepancy(&self, discrepancy: NewDiscrepancy) -> Result<(Discrepancy, bool), StoreError>;

    async fn fetch_discrepancy(&self, id: i64) -> Result<Option<Discrepancy>, StoreError>;

    /// Returns the discrepancies matching `filter`, newest first.
    async fn search_discrepancies(
        &self,
        filter: DiscrepancyFilter,
        pagination: Pagination,
    ) -> Result<Page<Discrepancy>, StoreError>;

    /// Marks the discrepancy as resolved. Resolving an already resolved discrepancy is an error.
    async fn resolve_discrepancy(&self, id: i64, resolved_by: &str, note: &str) -> Result<Discrepancy, StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyFilter {
    pub resolved: Option<bool>,
    /// Free-text search over the order reference and the details
    pub search: Option<String>,
}

impl DiscrepancyFilter {
    pub fn with_resolved(mut self, resolved: bool) -> Self {
        self.resolved = Some(resolved);
        self
    }

    pub fn with_search<S: Into<String>>(mut self, search: S) -> Self {
        let search = search.into();
        let trimmed = search.trim();
        self.search = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_none() && self.search.is_none()
    }
}
