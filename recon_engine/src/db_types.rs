use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
pub use recon_common::Paise;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(&'static str, String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The gateway-assigned order reference. The committed [`Order`] shares this identifier with its [`OrderIntent`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Checkout has started, but the gateway has not reported an outcome yet.
    Pending,
    /// The gateway captured the payment. Terminal.
    Paid,
    /// The gateway reported a failed payment. Terminal.
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError("payment status", s.to_string())),
        }
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order exists but has not been released for fulfillment.
    Pending,
    /// The payment has been captured and the order is being prepared for shipping.
    Processing,
    /// The shipping provider has picked up the consignment.
    Shipped,
    /// The consignment was delivered to the buyer.
    Delivered,
    /// The order was cancelled by a brand or an admin.
    Cancelled,
}

impl OrderStatusType {
    /// Whether the fulfillment state machine permits moving from `self` to `next`.
    ///
    /// `Pending → Processing → Shipped → Delivered`, with `Cancelled` reachable from `Pending` or `Processing` only.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Shipped) | (Shipped, Delivered) | (Pending | Processing, Cancelled)
        )
    }

    /// Statuses that may only be reached once the payment has been captured.
    pub fn requires_payment(&self) -> bool {
        matches!(self, OrderStatusType::Processing | OrderStatusType::Shipped | OrderStatusType::Delivered)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Processing => write!(f, "Processing"),
            OrderStatusType::Shipped => write!(f, "Shipped"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ConversionError("order status", s.to_string())),
        }
    }
}

//--------------------------------------       CartItem        ---------------------------------------------------------
/// A line item in the cart snapshot taken when checkout begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub brand_id: String,
    pub quantity: i64,
    pub unit_price: Paise,
    /// Declared shipping weight of a single unit
    #[serde(default)]
    pub weight_grams: Option<i64>,
}

impl CartItem {
    pub fn line_total(&self) -> Paise {
        self.unit_price * self.quantity
    }
}

//--------------------------------------      OrderIntent      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderIntent {
    pub id: i64,
    /// `None` for guest checkouts
    pub user_id: Option<String>,
    pub external_ref: OrderId,
    pub cart: Json<Vec<CartItem>>,
    pub total_amount: Paise,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     NewOrderIntent    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderIntent {
    pub external_ref: OrderId,
    pub user_id: Option<String>,
    pub cart: Vec<CartItem>,
    pub currency: String,
}

impl NewOrderIntent {
    pub fn new(external_ref: OrderId, user_id: Option<String>, cart: Vec<CartItem>) -> Self {
        Self { external_ref, user_id, cart, currency: recon_common::DEFAULT_CURRENCY_CODE.to_string() }
    }

    pub fn total_amount(&self) -> Paise {
        self.cart.iter().map(CartItem::line_total).sum()
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub intent_id: i64,
    pub user_id: Option<String>,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub payment_method: Option<String>,
    pub total_amount: Paise,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub brand_id: String,
    pub quantity: i64,
    pub price: Paise,
    pub weight_grams: Option<i64>,
}

//--------------------------------------     ShipmentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ShipmentStatus {
    /// A row exists, but the provider has not acknowledged the consignment yet.
    Requested,
    Created,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
    /// The provider rejected or failed the creation request. Can be retried by an operator.
    CreationFailed,
}

impl ShipmentStatus {
    /// Maps the provider's free-form tracking status onto our own.
    pub fn from_provider_status(s: &str) -> Option<Self> {
        let normalised = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalised.as_str() {
            "created" | "manifested" | "pickup_scheduled" => Some(Self::Created),
            "picked_up" | "shipped" => Some(Self::PickedUp),
            "in_transit" | "out_for_delivery" => Some(Self::InTransit),
            "delivered" => Some(Self::Delivered),
            "cancelled" | "canceled" | "rto" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// The order status implied by a shipment in this state, if any.
    pub fn implied_order_status(&self) -> Option<OrderStatusType> {
        match self {
            ShipmentStatus::PickedUp | ShipmentStatus::InTransit => Some(OrderStatusType::Shipped),
            ShipmentStatus::Delivered => Some(OrderStatusType::Delivered),
            _ => None,
        }
    }
}

impl Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShipmentStatus::Requested => "Requested",
            ShipmentStatus::Created => "Created",
            ShipmentStatus::PickedUp => "PickedUp",
            ShipmentStatus::InTransit => "InTransit",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::Cancelled => "Cancelled",
            ShipmentStatus::CreationFailed => "CreationFailed",
        };
        f.write_str(s)
    }
}

impl FromStr for ShipmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Requested" => Ok(Self::Requested),
            "Created" => Ok(Self::Created),
            "PickedUp" => Ok(Self::PickedUp),
            "InTransit" => Ok(Self::InTransit),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            "CreationFailed" => Ok(Self::CreationFailed),
            s => Err(ConversionError("shipment status", s.to_string())),
        }
    }
}

//--------------------------------------        Shipment       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Shipment {
    pub id: i64,
    pub order_id: OrderId,
    pub provider_shipment_id: Option<String>,
    pub awb_number: Option<String>,
    pub status: ShipmentStatus,
    pub weight_grams: Option<i64>,
    pub length_cm: Option<i64>,
    pub breadth_cm: Option<i64>,
    pub height_cm: Option<i64>,
    pub label_url: Option<String>,
    pub manifest_url: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn dimensions(&self) -> Option<Dimensions> {
        match (self.length_cm, self.breadth_cm, self.height_cm) {
            (Some(length_cm), Some(breadth_cm), Some(height_cm)) => Some(Dimensions { length_cm, breadth_cm, height_cm }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_cm: i64,
    pub breadth_cm: i64,
    pub height_cm: i64,
}

impl Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}cm", self.length_cm, self.breadth_cm, self.height_cm)
    }
}

#[derive(Debug, Clone)]
pub struct NewShipment {
    pub order_id: OrderId,
    pub weight_grams: Option<i64>,
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Label,
    Manifest,
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Label => write!(f, "label"),
            DocumentKind::Manifest => write!(f, "manifest"),
        }
    }
}

//--------------------------------------    DiscrepancyKind    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum DiscrepancyKind {
    /// A payment event contradicts the terminal state that was committed first.
    OutOfOrderPaymentEvent,
    /// A second capture with a different payment id arrived for an order that is already paid.
    DuplicateCapture,
    /// A payment event referenced an order that does not exist.
    UnknownOrderReference,
    ShipmentWeightMismatch,
    ShipmentDimensionMismatch,
    /// A shipping provider callback referenced an AWB with no matching shipment.
    OrphanShipmentCallback,
}

impl Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiscrepancyKind::OutOfOrderPaymentEvent => "OutOfOrderPaymentEvent",
            DiscrepancyKind::DuplicateCapture => "DuplicateCapture",
            DiscrepancyKind::UnknownOrderReference => "UnknownOrderReference",
            DiscrepancyKind::ShipmentWeightMismatch => "ShipmentWeightMismatch",
            DiscrepancyKind::ShipmentDimensionMismatch => "ShipmentDimensionMismatch",
            DiscrepancyKind::OrphanShipmentCallback => "OrphanShipmentCallback",
        };
        f.write_str(s)
    }
}

impl FromStr for DiscrepancyKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OutOfOrderPaymentEvent" => Ok(Self::OutOfOrderPaymentEvent),
            "DuplicateCapture" => Ok(Self::DuplicateCapture),
            "UnknownOrderReference" => Ok(Self::UnknownOrderReference),
            "ShipmentWeightMismatch" => Ok(Self::ShipmentWeightMismatch),
            "ShipmentDimensionMismatch" => Ok(Self::ShipmentDimensionMismatch),
            "OrphanShipmentCallback" => Ok(Self::OrphanShipmentCallback),
            s => Err(ConversionError("discrepancy kind", s.to_string())),
        }
    }
}

//--------------------------------------      Discrepancy      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Discrepancy {
    pub id: i64,
    pub order_ref: String,
    pub kind: DiscrepancyKind,
    pub details: String,
    #[serde(skip)]
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDiscrepancy {
    pub order_ref: String,
    pub kind: DiscrepancyKind,
    pub details: String,
    /// Identifies the underlying anomaly. Recording the same fingerprint twice yields a single record.
    pub fingerprint: String,
}

impl NewDiscrepancy {
    /// Creates a discrepancy whose fingerprint is derived from its reference, kind and details.
    pub fn new<R: Into<String>, D: Into<String>>(order_ref: R, kind: DiscrepancyKind, details: D) -> Self {
        let order_ref = order_ref.into();
        let details = details.into();
        let fingerprint = format!("{kind}:{order_ref}:{details}");
        Self { order_ref, kind, details, fingerprint }
    }

    pub fn with_fingerprint<S: Into<String>>(mut self, fingerprint: S) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }
}

//--------------------------------------         Actor         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorRole {
    /// A seller. May only act on orders containing their own brand's items.
    Brand,
    Admin,
}

impl FromStr for ActorRole {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "brand" => Ok(Self::Brand),
            "admin" => Ok(Self::Admin),
            _ => Err(ConversionError("actor role", s.to_string())),
        }
    }
}

/// The dashboard user performing a manual action. Identity is established upstream; this service only consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
    /// Required for `Brand` actors
    pub brand_id: Option<String>,
}

impl Actor {
    pub fn admin<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), role: ActorRole::Admin, brand_id: None }
    }

    pub fn brand<S: Into<String>>(id: S, brand_id: S) -> Self {
        Self { id: id.into(), role: ActorRole::Brand, brand_id: Some(brand_id.into()) }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.role, &self.brand_id) {
            (ActorRole::Brand, Some(b)) => write!(f, "brand:{b}:{}", self.id),
            (ActorRole::Brand, None) => write!(f, "brand:?:{}", self.id),
            (ActorRole::Admin, _) => write!(f, "admin:{}", self.id),
        }
    }
}

//--------------------------------------       OutboxEntry     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OutboxEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub const ORDER_PAID_EVENT: &str = "OrderPaid";

//--------------------------------------     StatusLogEntry    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub old_status: Option<OrderStatusType>,
    pub new_status: OrderStatusType,
    pub actor: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     PurchaseRecord    ---------------------------------------------------------
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseRecord {
    pub order_id: OrderId,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub brand_id: String,
    pub user_id: String,
    pub quantity: i64,
    pub unit_price: Paise,
}

impl NewPurchaseRecord {
    pub fn from_item(item: &OrderItem, user_id: Option<&str>) -> Self {
        Self {
            order_id: item.order_id.clone(),
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            brand_id: item.brand_id.clone(),
            user_id: user_id.unwrap_or(ANONYMOUS_USER).to_string(),
            quantity: item.quantity,
            unit_price: item.price,
        }
    }
}
