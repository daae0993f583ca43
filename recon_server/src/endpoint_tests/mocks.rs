use mockall::mock;
use recon_engine::{
    db_types::{Discrepancy, NewDiscrepancy},
    traits::{DiscrepancyFilter, DiscrepancyManagement, Page, Pagination, StoreError},
};

mock! {
    pub DiscrepancyStore {}
    impl DiscrepancyManagement for DiscrepancyStore {
        async fn record_discrepancy(&self, discrepancy: NewDiscrepancy) -> Result<(Discrepancy, bool), StoreError>;
        async fn fetch_discrepancy(&self, id: i64) -> Result<Option<Discrepancy>, StoreError>;
        async fn search_discrepancies(&self, filter: DiscrepancyFilter, pagination: Pagination) -> Result<Page<Discrepancy>, StoreError>;
        async fn resolve_discrepancy(&self, id: i64, resolved_by: &str, note: &str) -> Result<Discrepancy, StoreError>;
    }
}
