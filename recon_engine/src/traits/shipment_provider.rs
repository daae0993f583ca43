use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Dimensions, OrderId, OrderItem, Paise};

/// The external shipment provider (courier aggregator).
pub trait ShipmentProvider: Clone + Send + Sync + 'static {
    fn create_shipment(
        &self,
        request: ShipmentRequest,
    ) -> impl Future<Output = Result<ProviderShipment, DownstreamError>> + Send;

    fn generate_label(
        &self,
        provider_shipment_id: &str,
    ) -> impl Future<Output = Result<ProviderDocument, DownstreamError>> + Send;

    fn generate_manifest(
        &self,
        provider_shipment_id: &str,
    ) -> impl Future<Output = Result<ProviderDocument, DownstreamError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub order_id: OrderId,
    pub user_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_amount: Paise,
    pub weight_grams: i64,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderShipment {
    pub provider_shipment_id: String,
    pub awb_number: Option<String>,
}

/// A document returned by the provider. Some providers return the bytes inline and a hosted copy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderDocument {
    pub content: Vec<u8>,
    pub url: Option<String>,
}

/// Failures of any external collaborator: shipment provider, notification channel or cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownstreamError {
    #[error("The downstream service is unavailable. {0}")]
    Unavailable(String),
    #[error("The downstream call timed out")]
    Timeout,
    #[error("The downstream service rejected the request. {0}")]
    Rejected(String),
    #[error("The downstream service returned an invalid response. {0}")]
    InvalidResponse(String),
}
