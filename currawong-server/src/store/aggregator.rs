use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;

use crate::model::{Aggregator, AggregatorDomain, Certificate};

pub async fn select_aggregator(
    conn: &mut PgConnection,
    aggregator_id: i64,
) -> sqlx::Result<Option<Aggregator>> {
    sqlx::query_as("SELECT * FROM aggregator WHERE aggregator_id = $1")
        .bind(aggregator_id)
        .fetch_optional(conn)
        .await
}

pub async fn select_aggregators(pool: &PgPool, start: i64, limit: i64) -> sqlx::Result<Vec<Aggregator>> {
    sqlx::query_as("SELECT * FROM aggregator ORDER BY aggregator_id ASC OFFSET $1 LIMIT $2")
        .bind(start)
        .bind(limit)
        .fetch_all(pool)
        .await
}

pub async fn count_aggregators(pool: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT count(*) FROM aggregator").fetch_one(pool).await
}

pub async fn select_aggregator_domains(
    conn: &mut PgConnection,
    aggregator_id: i64,
) -> sqlx::Result<Vec<AggregatorDomain>> {
    sqlx::query_as("SELECT * FROM aggregator_domain WHERE aggregator_id = $1 ORDER BY aggregator_domain_id ASC")
        .bind(aggregator_id)
        .fetch_all(conn)
        .await
}

pub async fn insert_aggregator(
    conn: &mut PgConnection,
    name: &str,
    changed_time: OffsetDateTime,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "INSERT INTO aggregator (name, created_time, changed_time) VALUES ($1, now(), $2) \
         RETURNING aggregator_id",
    )
    .bind(name)
    .bind(changed_time)
    .fetch_one(conn)
    .await
}

pub async fn select_certificates_for_aggregator(
    pool: &PgPool,
    aggregator_id: i64,
    start: i64,
    limit: i64,
) -> sqlx::Result<Vec<Certificate>> {
    sqlx::query_as(
        "SELECT c.* FROM certificate c \
         JOIN certificate_assignment ca ON ca.certificate_id = c.certificate_id \
         WHERE ca.aggregator_id = $1 ORDER BY c.certificate_id ASC OFFSET $2 LIMIT $3",
    )
    .bind(aggregator_id)
    .bind(start)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Creates (or reuses, by LFDI) a certificate record and assigns it to the
/// aggregator. The LFDI is stored lowercased; lookups are case-insensitive.
pub async fn assign_certificate(
    conn: &mut PgConnection,
    aggregator_id: i64,
    lfdi: &str,
    expiry: OffsetDateTime,
) -> sqlx::Result<i64> {
    let certificate_id: i64 = sqlx::query_scalar(
        "INSERT INTO certificate (lfdi, created, expiry) VALUES (lower($1), now(), $2) \
         ON CONFLICT (lfdi) DO UPDATE SET expiry = excluded.expiry \
         RETURNING certificate_id",
    )
    .bind(lfdi)
    .bind(expiry)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO certificate_assignment (certificate_id, aggregator_id, assigned_time) \
         VALUES ($1, $2, now()) ON CONFLICT DO NOTHING",
    )
    .bind(certificate_id)
    .bind(aggregator_id)
    .execute(conn)
    .await?;

    Ok(certificate_id)
}

pub async fn unassign_certificate(
    conn: &mut PgConnection,
    aggregator_id: i64,
    certificate_id: i64,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "DELETE FROM certificate_assignment WHERE certificate_id = $1 AND aggregator_id = $2",
    )
    .bind(certificate_id)
    .bind(aggregator_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}
