use log::*;
use recon_engine::{db_types::OrderId, order_objects::PaymentEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PAYMENT_CAPTURED: &str = "payment.captured";
pub const PAYMENT_FAILED: &str = "payment.failed";

/// The envelope the payment gateway posts to `/gateway/webhook`.
///
/// Only the fields needed for reconciliation are modelled. Everything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayWebhook {
    pub event: String,
    #[serde(default)]
    pub payload: Option<GatewayPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub payment: Option<EntityWrapper>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityWrapper {
    pub entity: GatewayPayment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    /// The gateway's payment id, e.g. `pay_29QQoUBi66xm2f`
    pub id: String,
    /// The gateway order this payment belongs to. This is the order reference the intent was created with.
    pub order_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayConversionError {
    #[error("The webhook body is not valid JSON. {0}")]
    InvalidJson(String),
    #[error("The {0} webhook carries no payment entity")]
    MissingPayment(String),
    #[error("Payment {0} is not linked to an order")]
    MissingOrderReference(String),
}

/// Parses a raw webhook body. Returns `Ok(None)` for events that do not concern reconciliation.
pub fn payment_event_from_webhook(body: &[u8]) -> Result<Option<PaymentEvent>, GatewayConversionError> {
    let webhook = serde_json::from_slice::<GatewayWebhook>(body)
        .map_err(|e| GatewayConversionError::InvalidJson(e.to_string()))?;
    trace!("💳️ Gateway webhook: {webhook:?}");
    let event = webhook.event.as_str();
    if event != PAYMENT_CAPTURED && event != PAYMENT_FAILED {
        debug!("💳️ Ignoring gateway event {event}");
        return Ok(None);
    }
    let payment = webhook
        .payload
        .and_then(|p| p.payment)
        .map(|w| w.entity)
        .ok_or_else(|| GatewayConversionError::MissingPayment(webhook.event.clone()))?;
    let order_ref = payment
        .order_id
        .filter(|s| !s.trim().is_empty())
        .map(|s| OrderId::from(s.trim()))
        .ok_or_else(|| GatewayConversionError::MissingOrderReference(payment.id.clone()))?;
    let payment_id = payment.id;
    let method = payment.method;
    if event == PAYMENT_CAPTURED {
        Ok(Some(PaymentEvent::PaymentCaptured { order_ref, payment_id, method }))
    } else {
        if let Some(reason) = &payment.error_description {
            info!("💳️ Gateway reports payment {payment_id} for {order_ref} failed: {reason}");
        }
        Ok(Some(PaymentEvent::PaymentFailed { order_ref, payment_id, method }))
    }
}
