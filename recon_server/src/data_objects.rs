use std::fmt::Display;

use recon_engine::{
    db_types::{CartItem, NewOrderIntent, OrderId, OrderStatusType},
    traits::{DiscrepancyFilter, Pagination, DEFAULT_PAGE_SIZE},
    ReconciliationError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The cart snapshot the storefront submits when checkout begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub order_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub cart: Vec<CartItem>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl From<CheckoutRequest> for NewOrderIntent {
    fn from(req: CheckoutRequest) -> Self {
        let user_id = req.user_id.filter(|s| !s.trim().is_empty());
        let mut intent = NewOrderIntent::new(OrderId::from(req.order_id.trim()), user_id, req.cart);
        if let Some(currency) = req.currency.filter(|s| !s.trim().is_empty()) {
            intent.currency = currency;
        }
        intent
    }
}

/// Sent by the buyer's browser after the gateway redirects back to the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfirmation {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl StatusUpdateRequest {
    pub fn new_status(&self) -> Result<OrderStatusType, ReconciliationError> {
        self.status.trim().parse::<OrderStatusType>().map_err(|e| ReconciliationError::InvalidEvent(e.to_string()))
    }
}

/// Query parameters for the discrepancy list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscrepancyQuery {
    pub resolved: Option<bool>,
    pub search: Option<String>,
    pub offset: Option<i64>,
    pub count: Option<i64>,
}

impl DiscrepancyQuery {
    pub fn filter(&self) -> DiscrepancyFilter {
        let mut filter = DiscrepancyFilter::default();
        if let Some(resolved) = self.resolved {
            filter = filter.with_resolved(resolved);
        }
        if let Some(search) = &self.search {
            filter = filter.with_search(search.as_str());
        }
        filter
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.offset.unwrap_or(0), self.count.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub note: String,
}
