use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

use crate::{
    config::ShippingConfig,
    data_objects::{CreateShipmentRequest, CreateShipmentResponse, DocumentResponse, ShipmentDocument},
    ShippingApiError,
};

#[derive(Clone)]
pub struct ShippingApi {
    config: ShippingConfig,
    client: Arc<Client>,
}

impl ShippingApi {
    pub fn new(config: ShippingConfig) -> Result<Self, ShippingApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.api_token.reveal()))
            .map_err(|e| ShippingApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ShippingApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &ShippingConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, ShippingApiError> {
        let url = self.url(path);
        trace!("🚚️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("🚚️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ShippingApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await?;
            Err(ShippingApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    pub async fn create_shipment(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<CreateShipmentResponse, ShippingApiError> {
        debug!("🚚️ Creating shipment for order {}", request.order_id);
        let result = self
            .rest_query::<CreateShipmentResponse, _>(Method::POST, "/orders/create/adhoc", &[], Some(request))
            .await?;
        info!(
            "🚚️ Shipment {} created for order {} (AWB {})",
            result.shipment_id,
            request.order_id,
            result.awb().unwrap_or("not assigned")
        );
        Ok(result)
    }

    /// Generates the shipping label for a shipment and downloads it.
    pub async fn generate_label(&self, shipment_id: &str) -> Result<ShipmentDocument, ShippingApiError> {
        let body = json!({ "shipment_id": [shipment_id] });
        let result =
            self.rest_query::<DocumentResponse, _>(Method::POST, "/courier/generate/label", &[], Some(body)).await?;
        let url = result.url.ok_or_else(|| ShippingApiError::MissingDocument("label".into()))?;
        debug!("🚚️ Label for shipment {shipment_id} is at {url}");
        self.download(url).await
    }

    /// Generates the pickup manifest for a shipment and downloads it.
    pub async fn generate_manifest(&self, shipment_id: &str) -> Result<ShipmentDocument, ShippingApiError> {
        let body = json!({ "shipment_id": [shipment_id] });
        let result =
            self.rest_query::<DocumentResponse, _>(Method::POST, "/manifests/generate", &[], Some(body)).await?;
        let url = result.url.ok_or_else(|| ShippingApiError::MissingDocument("manifest".into()))?;
        debug!("🚚️ Manifest for shipment {shipment_id} is at {url}");
        self.download(url).await
    }

    async fn download(&self, url: String) -> Result<ShipmentDocument, ShippingApiError> {
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await?;
            return Err(ShippingApiError::QueryError { status, message });
        }
        let content = response.bytes().await?.to_vec();
        trace!("🚚️ Downloaded {} bytes from {url}", content.len());
        Ok(ShipmentDocument { url, content })
    }
}
