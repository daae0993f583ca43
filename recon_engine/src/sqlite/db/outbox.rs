use chrono::Duration;
use sqlx::SqliteConnection;

use crate::db_types::{OrderId, OutboxEntry};

pub async fn insert_entry(order_id: &OrderId, event_type: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO order_events (order_id, event_type) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(order_id.as_str())
        .bind(event_type)
        .execute(conn)
        .await?;
    Ok(())
}

fn seconds_ago(d: Duration) -> String {
    format!("-{} seconds", d.num_seconds().max(0))
}

/// Claims the entry for `lease`. Returns `true` if this call set `claimed_at`; `false` if the entry is completed, is
/// held by an unexpired claim, or does not exist.
pub async fn claim_entry(
    order_id: &OrderId,
    event_type: &str,
    lease: Duration,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE order_events SET claimed_at = CURRENT_TIMESTAMP
            WHERE order_id = $1 AND event_type = $2 AND completed_at IS NULL
              AND (claimed_at IS NULL OR claimed_at <= datetime('now', $3))
        "#,
    )
    .bind(order_id.as_str())
    .bind(event_type)
    .bind(seconds_ago(lease))
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn complete_entry(
    order_id: &OrderId,
    event_type: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE order_events SET completed_at = CURRENT_TIMESTAMP
            WHERE order_id = $1 AND event_type = $2 AND completed_at IS NULL
        "#,
    )
    .bind(order_id.as_str())
    .bind(event_type)
    .execute(conn)
    .await?;
    Ok(())
}

/// Entries that still need dispatching: never claimed and older than `grace_period`, or claimed more than `lease` ago
/// without being completed.
pub async fn fetch_pending(
    grace_period: Duration,
    lease: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<OutboxEntry>, sqlx::Error> {
    let entries = sqlx::query_as(
        r#"
            SELECT * FROM order_events
            WHERE completed_at IS NULL AND (
                (claimed_at IS NULL AND created_at <= datetime('now', $1))
                OR claimed_at <= datetime('now', $2)
            )
            ORDER BY id
        "#,
    )
    .bind(seconds_ago(grace_period))
    .bind(seconds_ago(lease))
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
