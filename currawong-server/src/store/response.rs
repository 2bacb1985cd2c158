//! Response persistence. Responses are deliberately not archived: the
//! snapshot ids pin them to a moment in time all by themselves.

use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;

use crate::model::response::ResponseType;
use crate::model::{DoeResponse, RateResponse};
use crate::mrid::PricingReadingType;
use crate::store::ListParams;

pub async fn insert_doe_response(
    conn: &mut PgConnection,
    doe_id_snapshot: i64,
    site_id: i64,
    response_type: ResponseType,
) -> sqlx::Result<DoeResponse> {
    sqlx::query_as(
        "INSERT INTO doe_response \
             (dynamic_operating_envelope_id_snapshot, site_id, response_type, created_time) \
         VALUES ($1, $2, $3, now()) \
         RETURNING *",
    )
    .bind(doe_id_snapshot)
    .bind(site_id)
    .bind(response_type)
    .fetch_one(conn)
    .await
}

pub async fn insert_rate_response(
    conn: &mut PgConnection,
    rate_id_snapshot: i64,
    site_id: i64,
    pricing_reading_type: PricingReadingType,
    response_type: ResponseType,
) -> sqlx::Result<RateResponse> {
    sqlx::query_as(
        "INSERT INTO rate_response \
             (tariff_generated_rate_id_snapshot, site_id, pricing_reading_type, response_type, created_time) \
         VALUES ($1, $2, $3, $4, now()) \
         RETURNING *",
    )
    .bind(rate_id_snapshot)
    .bind(site_id)
    .bind(pricing_reading_type)
    .bind(response_type)
    .fetch_one(conn)
    .await
}

/// Scope filter: a concrete site pins `site_id`, the virtual end-device
/// spans every site of the aggregator.
pub async fn select_doe_response_for_scope(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_id: Option<i64>,
    doe_response_id: i64,
) -> sqlx::Result<Option<DoeResponse>> {
    sqlx::query_as(
        "SELECT r.* FROM doe_response r \
         JOIN site s ON s.site_id = r.site_id \
         WHERE s.aggregator_id = $1 AND r.doe_response_id = $2 \
           AND ($3::bigint IS NULL OR r.site_id = $3)",
    )
    .bind(aggregator_id)
    .bind(doe_response_id)
    .bind(site_id)
    .fetch_optional(conn)
    .await
}

pub async fn select_doe_responses(
    pool: &PgPool,
    aggregator_id: i64,
    site_id: Option<i64>,
    params: ListParams,
) -> sqlx::Result<Vec<DoeResponse>> {
    sqlx::query_as(
        "SELECT r.* FROM doe_response r \
         JOIN site s ON s.site_id = r.site_id \
         WHERE s.aggregator_id = $1 AND ($2::bigint IS NULL OR r.site_id = $2) AND r.created_time >= $3 \
         ORDER BY r.created_time DESC, r.doe_response_id DESC OFFSET $4 LIMIT $5",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(params.after)
    .bind(params.start)
    .bind(params.limit)
    .fetch_all(pool)
    .await
}

pub async fn count_doe_responses(
    pool: &PgPool,
    aggregator_id: i64,
    site_id: Option<i64>,
    after: OffsetDateTime,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "SELECT count(*) FROM doe_response r \
         JOIN site s ON s.site_id = r.site_id \
         WHERE s.aggregator_id = $1 AND ($2::bigint IS NULL OR r.site_id = $2) AND r.created_time >= $3",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(after)
    .fetch_one(pool)
    .await
}

pub async fn select_rate_response_for_scope(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_id: Option<i64>,
    rate_response_id: i64,
) -> sqlx::Result<Option<RateResponse>> {
    sqlx::query_as(
        "SELECT r.* FROM rate_response r \
         JOIN site s ON s.site_id = r.site_id \
         WHERE s.aggregator_id = $1 AND r.rate_response_id = $2 \
           AND ($3::bigint IS NULL OR r.site_id = $3)",
    )
    .bind(aggregator_id)
    .bind(rate_response_id)
    .bind(site_id)
    .fetch_optional(conn)
    .await
}

pub async fn select_rate_responses(
    pool: &PgPool,
    aggregator_id: i64,
    site_id: Option<i64>,
    params: ListParams,
) -> sqlx::Result<Vec<RateResponse>> {
    sqlx::query_as(
        "SELECT r.* FROM rate_response r \
         JOIN site s ON s.site_id = r.site_id \
         WHERE s.aggregator_id = $1 AND ($2::bigint IS NULL OR r.site_id = $2) AND r.created_time >= $3 \
         ORDER BY r.created_time DESC, r.rate_response_id DESC OFFSET $4 LIMIT $5",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(params.after)
    .bind(params.start)
    .bind(params.limit)
    .fetch_all(pool)
    .await
}

pub async fn count_rate_responses(
    pool: &PgPool,
    aggregator_id: i64,
    site_id: Option<i64>,
    after: OffsetDateTime,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "SELECT count(*) FROM rate_response r \
         JOIN site s ON s.site_id = r.site_id \
         WHERE s.aggregator_id = $1 AND ($2::bigint IS NULL OR r.site_id = $2) AND r.created_time >= $3",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(after)
    .fetch_one(pool)
    .await
}
