use log::{debug, trace};
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewOrderIntent, OrderId, OrderIntent},
    traits::StoreError,
};

/// Inserts the intent, returning `false` in the second parameter if an intent with the same external reference
/// already exists. The existing intent is returned unchanged in that case.
pub async fn idempotent_insert(
    intent: NewOrderIntent,
    conn: &mut SqliteConnection,
) -> Result<(OrderIntent, bool), StoreError> {
    let total = intent.total_amount();
    let inserted: Option<OrderIntent> = sqlx::query_as(
        r#"
            INSERT INTO order_intents (user_id, external_ref, cart, total_amount, currency)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_ref) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(intent.user_id)
    .bind(intent.external_ref.as_str())
    .bind(Json(&intent.cart))
    .bind(total.value())
    .bind(intent.currency)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(intent) => {
            debug!("🗃️ Order intent [{}] inserted with id {}", intent.external_ref, intent.id);
            Ok((intent, true))
        },
        None => {
            trace!("🗃️ Order intent [{}] already exists", intent.external_ref);
            let existing = fetch_intent(&intent.external_ref, conn)
                .await?
                .ok_or_else(|| StoreError::IntentNotFound(intent.external_ref.clone()))?;
            Ok((existing, false))
        },
    }
}

pub async fn fetch_intent(external_ref: &OrderId, conn: &mut SqliteConnection) -> Result<Option<OrderIntent>, sqlx::Error> {
    let intent = sqlx::query_as("SELECT * FROM order_intents WHERE external_ref = $1")
        .bind(external_ref.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(intent)
}

/// Moves the intent from `Pending` to `Paid`. If the intent is not `Pending`, nothing is changed and `None` is
/// returned.
///
/// A `None` method leaves the stored method untouched, which is how client confirmations (which do not carry a
/// method) are recorded.
pub async fn mark_intent_paid(
    external_ref: &OrderId,
    payment_id: &str,
    method: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderIntent>, sqlx::Error> {
    let intent = sqlx::query_as(
        r#"
            UPDATE order_intents
            SET payment_status = 'Paid',
                payment_id = $1,
                payment_method = COALESCE($2, payment_method),
                updated_at = CURRENT_TIMESTAMP
            WHERE external_ref = $3 AND payment_status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .bind(method)
    .bind(external_ref.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(intent)
}

/// Moves the intent from `Pending` to `Failed`. Returns `None` if the intent was not `Pending`.
pub async fn mark_intent_failed(
    external_ref: &OrderId,
    payment_id: &str,
    method: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderIntent>, sqlx::Error> {
    let intent = sqlx::query_as(
        r#"
            UPDATE order_intents
            SET payment_status = 'Failed',
                payment_id = $1,
                payment_method = COALESCE($2, payment_method),
                updated_at = CURRENT_TIMESTAMP
            WHERE external_ref = $3 AND payment_status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .bind(method)
    .bind(external_ref.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(intent)
}
