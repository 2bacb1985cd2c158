use sqlx::{PgConnection, PgPool};

use crate::model::SiteLogEvent;
use crate::store::ListParams;

pub async fn insert_site_log_event(
    conn: &mut PgConnection,
    event: &SiteLogEvent,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO site_log_event \
             (site_id, function_set, log_event_code, log_event_pen, profile_id, details, created_time) \
         VALUES ($1, $2, $3, $4, $5, $6, now()) \
         RETURNING site_log_event_id",
    )
    .bind(event.site_id)
    .bind(event.function_set)
    .bind(event.log_event_code)
    .bind(event.log_event_pen)
    .bind(event.profile_id)
    .bind(&event.details)
    .fetch_one(conn)
    .await
}

pub async fn select_site_log_event_by_id(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_id: i64,
    site_log_event_id: i64,
) -> sqlx::Result<Option<SiteLogEvent>> {
    sqlx::query_as(
        "SELECT e.* FROM site_log_event e \
         JOIN site s ON s.site_id = e.site_id \
         WHERE s.aggregator_id = $1 AND e.site_id = $2 AND e.site_log_event_id = $3",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(site_log_event_id)
    .fetch_optional(conn)
    .await
}

/// sep2 LogEventList ordering: newest first, id descending as tiebreak.
pub async fn select_site_log_events(
    pool: &PgPool,
    aggregator_id: i64,
    site_id: i64,
    params: ListParams,
) -> sqlx::Result<Vec<SiteLogEvent>> {
    sqlx::query_as(
        "SELECT e.* FROM site_log_event e \
         JOIN site s ON s.site_id = e.site_id \
         WHERE s.aggregator_id = $1 AND e.site_id = $2 AND e.created_time >= $3 \
         ORDER BY e.created_time DESC, e.site_log_event_id DESC OFFSET $4 LIMIT $5",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(params.after)
    .bind(params.start)
    .bind(params.limit)
    .fetch_all(pool)
    .await
}

pub async fn count_site_log_events(
    pool: &PgPool,
    aggregator_id: i64,
    site_id: i64,
    after: time::OffsetDateTime,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "SELECT count(*) FROM site_log_event e \
         JOIN site s ON s.site_id = e.site_id \
         WHERE s.aggregator_id = $1 AND e.site_id = $2 AND e.created_time >= $3",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(after)
    .fetch_one(pool)
    .await
}
