use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;

use crate::model::SiteReadingType;
use crate::store::archive::{self, specs};
use crate::store::ListParams;

/// The natural key identifying a mirror usage point channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingTypeKey {
    pub aggregator_id: i64,
    pub site_id: i64,
    pub uom: i32,
    pub kind: i32,
    pub phase: i32,
    pub flow_direction: i32,
    pub data_qualifier: i32,
    pub accumulation_behaviour: i32,
}

pub async fn select_reading_type_by_id(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_reading_type_id: i64,
) -> sqlx::Result<Option<SiteReadingType>> {
    sqlx::query_as("SELECT * FROM site_reading_type WHERE aggregator_id = $1 AND site_reading_type_id = $2")
        .bind(aggregator_id)
        .bind(site_reading_type_id)
        .fetch_optional(conn)
        .await
}

pub async fn select_reading_types_for_aggregator(
    pool: &PgPool,
    aggregator_id: i64,
    params: ListParams,
) -> sqlx::Result<Vec<SiteReadingType>> {
    sqlx::query_as(
        "SELECT * FROM site_reading_type WHERE aggregator_id = $1 AND changed_time >= $2 \
         ORDER BY changed_time DESC, site_reading_type_id ASC OFFSET $3 LIMIT $4",
    )
    .bind(aggregator_id)
    .bind(params.after)
    .bind(params.start)
    .bind(params.limit)
    .fetch_all(pool)
    .await
}

pub async fn count_reading_types_for_site(pool: &PgPool, site_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT count(*) FROM site_reading_type WHERE site_id = $1")
        .bind(site_id)
        .fetch_one(pool)
        .await
}

pub async fn count_reading_types_for_aggregator(
    pool: &PgPool,
    aggregator_id: i64,
    after: OffsetDateTime,
) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT count(*) FROM site_reading_type WHERE aggregator_id = $1 AND changed_time >= $2")
        .bind(aggregator_id)
        .bind(after)
        .fetch_one(pool)
        .await
}

/// Registers (or refreshes) the channel identified by `key`, archiving the
/// pre-image on update. Returns the channel id.
pub async fn upsert_reading_type(
    conn: &mut PgConnection,
    key: &ReadingTypeKey,
    mup_lfdi: &str,
    power_of_ten_multiplier: i16,
    default_interval_seconds: i32,
    changed_time: OffsetDateTime,
) -> sqlx::Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT site_reading_type_id FROM site_reading_type \
         WHERE aggregator_id = $1 AND site_id = $2 AND uom = $3 AND kind = $4 AND phase = $5 \
           AND flow_direction = $6 AND data_qualifier = $7 AND accumulation_behaviour = $8",
    )
    .bind(key.aggregator_id)
    .bind(key.site_id)
    .bind(key.uom)
    .bind(key.kind)
    .bind(key.phase)
    .bind(key.flow_direction)
    .bind(key.data_qualifier)
    .bind(key.accumulation_behaviour)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(site_reading_type_id) = existing {
        archive::copy_into_archive(
            conn,
            &specs::SITE_READING_TYPE,
            "site_reading_type_id = $1",
            site_reading_type_id,
        )
        .await?;

        sqlx::query(
            "UPDATE site_reading_type SET \
                 mup_lfdi = $2, power_of_ten_multiplier = $3, default_interval_seconds = $4, changed_time = $5 \
             WHERE site_reading_type_id = $1",
        )
        .bind(site_reading_type_id)
        .bind(mup_lfdi)
        .bind(power_of_ten_multiplier)
        .bind(default_interval_seconds)
        .bind(changed_time)
        .execute(conn)
        .await?;

        return Ok(site_reading_type_id);
    }

    sqlx::query_scalar(
        "INSERT INTO site_reading_type \
             (aggregator_id, site_id, mup_lfdi, uom, data_qualifier, flow_direction, accumulation_behaviour, \
              kind, phase, power_of_ten_multiplier, default_interval_seconds, created_time, changed_time) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now(), $12) \
         RETURNING site_reading_type_id",
    )
    .bind(key.aggregator_id)
    .bind(key.site_id)
    .bind(mup_lfdi)
    .bind(key.uom)
    .bind(key.data_qualifier)
    .bind(key.flow_direction)
    .bind(key.accumulation_behaviour)
    .bind(key.kind)
    .bind(key.phase)
    .bind(power_of_ten_multiplier)
    .bind(default_interval_seconds)
    .bind(changed_time)
    .fetch_one(conn)
    .await
}

pub async fn delete_reading_type(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_reading_type_id: i64,
    deleted_time: OffsetDateTime,
) -> sqlx::Result<bool> {
    let in_scope = select_reading_type_by_id(conn, aggregator_id, site_reading_type_id).await?;
    if in_scope.is_none() {
        return Ok(false);
    }

    archive::delete_into_archive(
        conn,
        &specs::SITE_READING,
        "site_reading_type_id = $1",
        site_reading_type_id,
        deleted_time,
    )
    .await?;
    let removed = archive::delete_into_archive(
        conn,
        &specs::SITE_READING_TYPE,
        "site_reading_type_id = $1",
        site_reading_type_id,
        deleted_time,
    )
    .await?;

    Ok(removed > 0)
}

/// One ingested sample, keyed `(site_reading_type_id, time_period_start)`.
#[derive(Debug, Clone)]
pub struct ReadingUpsert {
    pub site_reading_type_id: i64,
    pub local_id: Option<i32>,
    pub quality_flags: i32,
    pub time_period_start: OffsetDateTime,
    pub time_period_seconds: i32,
    pub value: i64,
}

/// Ingest upsert: a conflicting sample overwrites value, quality and
/// local_id. Pre-images are archived.
pub async fn upsert_readings(
    conn: &mut PgConnection,
    readings: &[ReadingUpsert],
    changed_time: OffsetDateTime,
) -> sqlx::Result<()> {
    for reading in readings {
        archive::copy_into_archive_by_id_and_time(
            conn,
            &specs::SITE_READING,
            "site_reading_type_id = $1 AND time_period_start = $2",
            reading.site_reading_type_id,
            reading.time_period_start,
        )
        .await?;

        sqlx::query(
            "INSERT INTO site_reading \
                 (site_reading_type_id, local_id, quality_flags, time_period_start, time_period_seconds, \
                  value, created_time, changed_time) \
             VALUES ($1, $2, $3, $4, $5, $6, now(), $7) \
             ON CONFLICT (site_reading_type_id, time_period_start) DO UPDATE SET \
                 local_id = excluded.local_id, \
                 quality_flags = excluded.quality_flags, \
                 time_period_seconds = excluded.time_period_seconds, \
                 value = excluded.value, \
                 changed_time = excluded.changed_time",
        )
        .bind(reading.site_reading_type_id)
        .bind(reading.local_id)
        .bind(reading.quality_flags)
        .bind(reading.time_period_start)
        .bind(reading.time_period_seconds)
        .bind(reading.value)
        .bind(changed_time)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

