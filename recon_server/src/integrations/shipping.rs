use chrono::Utc;
use log::*;
use recon_engine::{
    db_types::Dimensions,
    fulfillment_objects::ShipmentUpdate,
    traits::{DownstreamError, ProviderDocument, ProviderShipment, ShipmentProvider, ShipmentRequest},
};
use serde::{Deserialize, Serialize};
use shipping_tools::{
    helpers::format_rupees,
    CreateShipmentRequest,
    PackageDimensions,
    ShipmentLineItem,
    ShippingApi,
    ShippingApiError,
    ShippingConfig,
};

/// The shipment provider, as seen by the fulfillment coordinator.
#[derive(Clone)]
pub struct ShippingProvider {
    api: ShippingApi,
}

impl ShippingProvider {
    pub fn new(config: ShippingConfig) -> Result<Self, ShippingApiError> {
        let api = ShippingApi::new(config)?;
        Ok(Self { api })
    }

    fn create_request(&self, request: &ShipmentRequest) -> CreateShipmentRequest {
        let mut req = CreateShipmentRequest::new(
            request.order_id.as_str(),
            Utc::now(),
            &self.api.config().pickup_location,
        );
        req.customer_id = request.user_id.clone();
        req.order_items = request
            .items
            .iter()
            .map(|item| ShipmentLineItem {
                name: item.product_id.clone(),
                sku: item.variant_id.clone().unwrap_or_else(|| item.product_id.clone()),
                units: item.quantity,
                selling_price: format_rupees(item.price),
            })
            .collect();
        req.sub_total = format_rupees(request.total_amount);
        let dims = PackageDimensions {
            length_cm: request.dimensions.length_cm,
            breadth_cm: request.dimensions.breadth_cm,
            height_cm: request.dimensions.height_cm,
        };
        req.with_package(request.weight_grams, dims)
    }
}

impl ShipmentProvider for ShippingProvider {
    async fn create_shipment(&self, request: ShipmentRequest) -> Result<ProviderShipment, DownstreamError> {
        let req = self.create_request(&request);
        let response = self.api.create_shipment(&req).await.map_err(downstream_error)?;
        let awb_number = response.awb().map(|s| s.to_string());
        Ok(ProviderShipment { provider_shipment_id: response.shipment_id, awb_number })
    }

    async fn generate_label(&self, provider_shipment_id: &str) -> Result<ProviderDocument, DownstreamError> {
        let doc = self.api.generate_label(provider_shipment_id).await.map_err(downstream_error)?;
        Ok(ProviderDocument { content: doc.content, url: Some(doc.url) })
    }

    async fn generate_manifest(&self, provider_shipment_id: &str) -> Result<ProviderDocument, DownstreamError> {
        let doc = self.api.generate_manifest(provider_shipment_id).await.map_err(downstream_error)?;
        Ok(ProviderDocument { content: doc.content, url: Some(doc.url) })
    }
}

fn downstream_error(e: ShippingApiError) -> DownstreamError {
    warn!("🚚️ Shipment provider call failed. {e}");
    match e {
        ShippingApiError::Timeout => DownstreamError::Timeout,
        ShippingApiError::QueryError { status, message } if !(status == 429 || status >= 500) => {
            DownstreamError::Rejected(format!("{status}: {message}"))
        },
        e if e.is_transient() => DownstreamError::Unavailable(e.to_string()),
        ShippingApiError::JsonError(s) | ShippingApiError::RestResponseError(s) => DownstreamError::InvalidResponse(s),
        e @ ShippingApiError::MissingDocument(_) => DownstreamError::InvalidResponse(e.to_string()),
        e => DownstreamError::Unavailable(e.to_string()),
    }
}

/// A tracking callback posted by the shipment provider to `/shipping/webhook`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingWebhook {
    #[serde(alias = "awb_code")]
    pub awb: String,
    #[serde(alias = "shipment_status", alias = "status")]
    pub current_status: String,
    /// The weight measured by the courier
    #[serde(default)]
    pub weight_grams: Option<i64>,
    #[serde(default)]
    pub length_cm: Option<i64>,
    #[serde(default)]
    pub breadth_cm: Option<i64>,
    #[serde(default)]
    pub height_cm: Option<i64>,
}

impl From<ShippingWebhook> for ShipmentUpdate {
    fn from(hook: ShippingWebhook) -> Self {
        // Partial measurements cannot be compared, so they are dropped
        let dimensions = match (hook.length_cm, hook.breadth_cm, hook.height_cm) {
            (Some(length_cm), Some(breadth_cm), Some(height_cm)) => Some(Dimensions { length_cm, breadth_cm, height_cm }),
            _ => None,
        };
        ShipmentUpdate {
            awb_number: hook.awb.trim().to_string(),
            status: hook.current_status,
            weight_grams: hook.weight_grams,
            dimensions,
        }
    }
}
