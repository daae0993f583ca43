use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Body of the provider's "create adhoc order" call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShipmentRequest {
    pub order_id: String,
    pub order_date: String,
    pub pickup_location: String,
    pub customer_id: Option<String>,
    pub order_items: Vec<ShipmentLineItem>,
    /// Always prepaid. Payment has been captured by the time a shipment is requested.
    pub payment_method: String,
    /// Rupees, formatted with two decimal places
    pub sub_total: String,
    /// Kilograms
    pub weight: f64,
    pub length: i64,
    pub breadth: i64,
    pub height: i64,
}

impl CreateShipmentRequest {
    pub fn new(order_id: &str, order_date: DateTime<Utc>, pickup_location: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            order_date: order_date.format("%Y-%m-%d %H:%M").to_string(),
            pickup_location: pickup_location.to_string(),
            customer_id: None,
            order_items: vec![],
            payment_method: "Prepaid".to_string(),
            sub_total: "0.00".to_string(),
            weight: 0.0,
            length: 0,
            breadth: 0,
            height: 0,
        }
    }

    pub fn with_package(mut self, weight_grams: i64, dims: PackageDimensions) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let kg = weight_grams as f64 / 1000.0;
        self.weight = kg;
        self.length = dims.length_cm;
        self.breadth = dims.breadth_cm;
        self.height = dims.height_cm;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDimensions {
    pub length_cm: i64,
    pub breadth_cm: i64,
    pub height_cm: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentLineItem {
    pub name: String,
    pub sku: String,
    pub units: i64,
    pub selling_price: String,
}

/// The provider's answer to a creation request. Identifiers come back as numbers or strings depending on the
/// endpoint version, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShipmentResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub shipment_id: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Only present once a courier has been assigned
    #[serde(default, alias = "awb_code")]
    pub awb_number: Option<String>,
}

impl CreateShipmentResponse {
    pub fn awb(&self) -> Option<&str> {
        self.awb_number.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Label and manifest calls return a link to the generated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentResponse {
    #[serde(default, alias = "label_url", alias = "manifest_url")]
    pub url: Option<String>,
    #[serde(default)]
    pub not_created: Vec<serde_json::Value>,
}

/// A downloaded document, along with the link it was fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentDocument {
    pub url: String,
    pub content: Vec<u8>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        S(String),
        N(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::S(s) => s,
        Id::N(n) => n.to_string(),
    })
}
