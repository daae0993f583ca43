use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Order, OrderId, OrderIntent, OrderItem, OrderStatusType, StatusLogEntry},
    traits::StoreError,
};

/// Creates the committed order for a freshly paid intent. The order starts in `Processing`.
///
/// This is not atomic on its own. Embed it in the same transaction as the intent update, passing `&mut *tx` as the
/// connection argument.
pub async fn insert_order_for_intent(intent: &OrderIntent, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                intent_id,
                user_id,
                status,
                payment_status,
                payment_id,
                payment_method,
                total_amount,
                currency
            ) VALUES ($1, $2, $3, 'Processing', $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(intent.external_ref.as_str())
    .bind(intent.id)
    .bind(intent.user_id.as_deref())
    .bind(intent.payment_status.to_string())
    .bind(intent.payment_id.as_deref())
    .bind(intent.payment_method.as_deref())
    .bind(intent.total_amount.value())
    .bind(intent.currency.as_str())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order {} created from intent #{}", order.order_id, intent.id);
    Ok(order)
}

/// Copies the intent's cart snapshot into the order's line items.
pub async fn insert_items_for_intent(
    intent: &OrderIntent,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, StoreError> {
    let mut items = Vec::with_capacity(intent.cart.0.len());
    for line in &intent.cart.0 {
        let item: OrderItem = sqlx::query_as(
            r#"
                INSERT INTO order_items (order_id, product_id, variant_id, brand_id, quantity, price, weight_grams)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *;
            "#,
        )
        .bind(intent.external_ref.as_str())
        .bind(line.product_id.as_str())
        .bind(line.variant_id.as_deref())
        .bind(line.brand_id.as_str())
        .bind(line.quantity)
        .bind(line.unit_price.value())
        .bind(line.weight_grams)
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }
    trace!("🗃️ {} line items saved for order {}", items.len(), intent.external_ref);
    Ok(items)
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Conditionally changes the order status. The update only happens if the status is still `from`.
///
/// Returns the updated order, or `None` if the order was not in `from` status (or does not exist).
pub async fn update_status_if(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status = $3
            RETURNING *;
        "#,
    )
    .bind(to.to_string())
    .bind(order_id.as_str())
    .bind(from.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn insert_status_log(
    order_id: &OrderId,
    old_status: Option<OrderStatusType>,
    new_status: OrderStatusType,
    actor: &str,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO order_status_log (order_id, old_status, new_status, actor, reason)
            VALUES ($1, $2, $3, $4, $5);
        "#,
    )
    .bind(order_id.as_str())
    .bind(old_status.map(|s| s.to_string()))
    .bind(new_status.to_string())
    .bind(actor)
    .bind(reason)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_status_log(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusLogEntry>, sqlx::Error> {
    let log = sqlx::query_as("SELECT * FROM order_status_log WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(log)
}
