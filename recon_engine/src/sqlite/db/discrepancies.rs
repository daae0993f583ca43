use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{Discrepancy, NewDiscrepancy},
    traits::{DiscrepancyFilter, Page, Pagination, StoreError},
};

/// Appends the discrepancy unless one with the same fingerprint exists. Returns `false` in the second parameter if
/// the record already existed.
pub async fn idempotent_insert(
    discrepancy: NewDiscrepancy,
    conn: &mut SqliteConnection,
) -> Result<(Discrepancy, bool), StoreError> {
    let inserted: Option<Discrepancy> = sqlx::query_as(
        r#"
            INSERT INTO discrepancies (order_ref, kind, details, fingerprint)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (fingerprint) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(discrepancy.order_ref.as_str())
    .bind(discrepancy.kind.to_string())
    .bind(discrepancy.details.as_str())
    .bind(discrepancy.fingerprint.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(d) = inserted {
        debug!("🗃️ Discrepancy #{} ({}) recorded for {}", d.id, d.kind, d.order_ref);
        return Ok((d, true));
    }
    trace!("🗃️ Discrepancy with fingerprint {} already exists", discrepancy.fingerprint);
    let existing: Discrepancy = sqlx::query_as("SELECT * FROM discrepancies WHERE fingerprint = $1")
        .bind(discrepancy.fingerprint.as_str())
        .fetch_one(conn)
        .await?;
    Ok((existing, false))
}

pub async fn fetch_discrepancy(id: i64, conn: &mut SqliteConnection) -> Result<Option<Discrepancy>, sqlx::Error> {
    let d = sqlx::query_as("SELECT * FROM discrepancies WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(d)
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &DiscrepancyFilter) {
    if filter.is_empty() {
        return;
    }
    builder.push(" WHERE ");
    let mut where_clause = builder.separated(" AND ");
    if let Some(resolved) = filter.resolved {
        where_clause.push("resolved = ");
        where_clause.push_bind_unseparated(resolved);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        where_clause.push("(order_ref LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" ESCAPE '\\' OR details LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" ESCAPE '\\' OR kind LIKE ");
        where_clause.push_bind_unseparated(pattern);
        where_clause.push_unseparated(" ESCAPE '\\')");
    }
}

/// Search text is matched literally, so the `LIKE` wildcards and the escape character itself are escaped.
fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Fetches one page of discrepancies matching the filter, newest first, along with the total number of matches.
pub async fn search(
    filter: DiscrepancyFilter,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Page<Discrepancy>, sqlx::Error> {
    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM discrepancies");
    push_filter(&mut count_query, &filter);
    let total: i64 = count_query.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM discrepancies");
    push_filter(&mut builder, &filter);
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(pagination.count);
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset);
    trace!("🗃️ Executing query: {}", builder.sql());
    let items = builder.build_query_as::<Discrepancy>().fetch_all(conn).await?;
    Ok(Page::new(total, pagination, items))
}

pub async fn resolve(
    id: i64,
    resolved_by: &str,
    note: &str,
    conn: &mut SqliteConnection,
) -> Result<Discrepancy, StoreError> {
    let resolved: Option<Discrepancy> = sqlx::query_as(
        r#"
            UPDATE discrepancies
            SET resolved = TRUE, resolved_at = CURRENT_TIMESTAMP, resolved_by = $1, resolution_note = $2
            WHERE id = $3 AND resolved = FALSE
            RETURNING *;
        "#,
    )
    .bind(resolved_by)
    .bind(note)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    match resolved {
        Some(d) => Ok(d),
        None => match fetch_discrepancy(id, conn).await? {
            Some(_) => Err(StoreError::DiscrepancyAlreadyResolved(id)),
            None => Err(StoreError::DiscrepancyNotFound(id)),
        },
    }
}

#[cfg(test)]
mod test {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("ord_1"), "ord\\_1");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }
}
