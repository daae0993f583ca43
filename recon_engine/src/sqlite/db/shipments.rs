use chrono::Duration;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{DocumentKind, NewShipment, OrderId, Shipment, ShipmentStatus},
    traits::{ShipmentSlot, StoreError},
};

/// Reserves the live shipment row for an order.
///
/// 1. A `CreationFailed` shipment, or a `Requested` one that never got a provider id and has not been touched for
///    `reclaim_after`, is flipped back to `Requested` and handed to the caller.
/// 2. Otherwise a new `Requested` row is inserted. The partial unique index on `order_id` makes this a no-op if a live
///    shipment already exists.
/// 3. If neither wrote a row, the existing live shipment is returned.
///
/// Run this inside a transaction so that the three steps see a consistent view.
pub async fn reserve(
    shipment: NewShipment,
    reclaim_after: Duration,
    conn: &mut SqliteConnection,
) -> Result<ShipmentSlot, StoreError> {
    let (length, breadth, height) = match shipment.dimensions {
        Some(d) => (Some(d.length_cm), Some(d.breadth_cm), Some(d.height_cm)),
        None => (None, None, None),
    };
    let recycled: Option<Shipment> = sqlx::query_as(
        r#"
            UPDATE shipments
            SET status = 'Requested',
                last_error = NULL,
                weight_grams = $1,
                length_cm = $2,
                breadth_cm = $3,
                height_cm = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $5 AND (
                status = 'CreationFailed'
                OR (status = 'Requested' AND provider_shipment_id IS NULL AND updated_at <= datetime('now', $6))
            )
            RETURNING *;
        "#,
    )
    .bind(shipment.weight_grams)
    .bind(length)
    .bind(breadth)
    .bind(height)
    .bind(shipment.order_id.as_str())
    .bind(format!("-{} seconds", reclaim_after.num_seconds().max(0)))
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(s) = recycled {
        trace!("🗃️ Recycled shipment #{} for order {}", s.id, s.order_id);
        return Ok(ShipmentSlot::Reserved(s));
    }
    let inserted: Option<Shipment> = sqlx::query_as(
        r#"
            INSERT OR IGNORE INTO shipments (order_id, status, weight_grams, length_cm, breadth_cm, height_cm)
            VALUES ($1, 'Requested', $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(shipment.order_id.as_str())
    .bind(shipment.weight_grams)
    .bind(length)
    .bind(breadth)
    .bind(height)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(s) = inserted {
        trace!("🗃️ Reserved shipment #{} for order {}", s.id, s.order_id);
        return Ok(ShipmentSlot::Reserved(s));
    }
    let existing = fetch_live_for_order(&shipment.order_id, conn).await?.ok_or_else(|| {
        StoreError::InvalidData(format!("Shipment for {} was neither inserted nor found", shipment.order_id))
    })?;
    Ok(ShipmentSlot::Existing(existing))
}

pub async fn fetch_live_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Shipment>, sqlx::Error> {
    let shipment = sqlx::query_as("SELECT * FROM shipments WHERE order_id = $1 AND status <> 'Cancelled'")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(shipment)
}

pub async fn fetch_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<Shipment>, sqlx::Error> {
    let shipments = sqlx::query_as("SELECT * FROM shipments WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(shipments)
}

pub async fn fetch_shipment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Shipment>, sqlx::Error> {
    let shipment = sqlx::query_as("SELECT * FROM shipments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(shipment)
}

pub async fn fetch_by_awb(awb: &str, conn: &mut SqliteConnection) -> Result<Option<Shipment>, sqlx::Error> {
    let shipment =
        sqlx::query_as("SELECT * FROM shipments WHERE awb_number = $1").bind(awb).fetch_optional(conn).await?;
    Ok(shipment)
}

pub async fn mark_created(
    id: i64,
    provider_shipment_id: &str,
    awb_number: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Shipment, StoreError> {
    let shipment = sqlx::query_as(
        r#"
            UPDATE shipments
            SET status = 'Created',
                provider_shipment_id = $1,
                awb_number = $2,
                last_error = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            RETURNING *;
        "#,
    )
    .bind(provider_shipment_id)
    .bind(awb_number)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    shipment.ok_or(StoreError::ShipmentNotFound(id))
}

pub async fn mark_failed(id: i64, error: &str, conn: &mut SqliteConnection) -> Result<Shipment, StoreError> {
    let shipment = sqlx::query_as(
        r#"
            UPDATE shipments
            SET status = 'CreationFailed', last_error = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(error)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    shipment.ok_or(StoreError::ShipmentNotFound(id))
}

pub async fn update_status(
    id: i64,
    status: ShipmentStatus,
    conn: &mut SqliteConnection,
) -> Result<Shipment, StoreError> {
    let shipment = sqlx::query_as(
        "UPDATE shipments SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(status.to_string())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    shipment.ok_or(StoreError::ShipmentNotFound(id))
}

pub async fn set_document_url(
    id: i64,
    kind: DocumentKind,
    url: &str,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let sql = match kind {
        DocumentKind::Label => "UPDATE shipments SET label_url = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
        DocumentKind::Manifest => {
            "UPDATE shipments SET manifest_url = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2"
        },
    };
    let result = sqlx::query(sql).bind(url).bind(id).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ShipmentNotFound(id));
    }
    Ok(())
}
