use std::{fmt::Display, future::Future};

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{OrderId, OrderStatusType},
    traits::DownstreamError,
};

/// Delivers buyer and seller notifications. Delivery is best-effort: a failure here never affects order state.
pub trait Notifier: Clone + Send + Sync + 'static {
    fn notify(&self, notification: Notification) -> impl Future<Output = Result<(), DownstreamError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum Recipient {
    /// `None` for guest checkouts
    Buyer(Option<String>),
    Seller(String),
}

impl Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipient::Buyer(Some(id)) => write!(f, "buyer {id}"),
            Recipient::Buyer(None) => write!(f, "guest buyer"),
            Recipient::Seller(brand) => write!(f, "seller {brand}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    OrderConfirmed,
    NewSale,
    StatusChanged(OrderStatusType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub order_id: OrderId,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(recipient: Recipient, order_id: OrderId, kind: NotificationKind) -> Self {
        Self { recipient, order_id, kind }
    }
}
