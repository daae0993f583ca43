use sqlx::SqliteConnection;

use crate::db_types::{NewPurchaseRecord, OrderId};

/// Inserts the purchase record unless one already exists for the same order line. Returns `true` if it was inserted.
pub async fn insert_or_ignore(record: &NewPurchaseRecord, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT OR IGNORE INTO purchase_records
                (order_id, product_id, variant_id, brand_id, user_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(record.order_id.as_str())
    .bind(record.product_id.as_str())
    .bind(record.variant_id.as_deref())
    .bind(record.brand_id.as_str())
    .bind(record.user_id.as_str())
    .bind(record.quantity)
    .bind(record.unit_price.value())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn count_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchase_records WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_one(conn)
        .await?;
    Ok(count)
}
