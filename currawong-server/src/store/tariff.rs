use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;

use crate::model::{Tariff, TariffGeneratedRate};
use crate::store::archive::{self, specs};
use crate::store::ListParams;

pub async fn select_tariffs(pool: &PgPool, params: ListParams) -> sqlx::Result<Vec<Tariff>> {
    sqlx::query_as(
        "SELECT * FROM tariff WHERE changed_time >= $1 \
         ORDER BY changed_time DESC, tariff_id DESC OFFSET $2 LIMIT $3",
    )
    .bind(params.after)
    .bind(params.start)
    .bind(params.limit)
    .fetch_all(pool)
    .await
}

pub async fn count_tariffs(pool: &PgPool, after: OffsetDateTime) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT count(*) FROM tariff WHERE changed_time >= $1")
        .bind(after)
        .fetch_one(pool)
        .await
}

pub async fn select_tariff_by_id(conn: &mut PgConnection, tariff_id: i64) -> sqlx::Result<Option<Tariff>> {
    sqlx::query_as("SELECT * FROM tariff WHERE tariff_id = $1")
        .bind(tariff_id)
        .fetch_optional(conn)
        .await
}

/// Fetches one rate, constrained to the aggregator (and optionally a single
/// site) so out-of-scope ids read as absent.
pub async fn select_rate_for_scope(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_id: Option<i64>,
    rate_id: i64,
) -> sqlx::Result<Option<TariffGeneratedRate>> {
    sqlx::query_as(
        "SELECT r.* FROM tariff_generated_rate r \
         JOIN site s ON s.site_id = r.site_id \
         WHERE s.aggregator_id = $1 AND r.tariff_generated_rate_id = $2 \
           AND ($3::bigint IS NULL OR r.site_id = $3)",
    )
    .bind(aggregator_id)
    .bind(rate_id)
    .bind(site_id)
    .fetch_optional(conn)
    .await
}

pub async fn select_rates_for_site(
    pool: &PgPool,
    aggregator_id: i64,
    tariff_id: i64,
    site_id: i64,
    params: ListParams,
) -> sqlx::Result<Vec<TariffGeneratedRate>> {
    sqlx::query_as(
        "SELECT r.* FROM tariff_generated_rate r \
         JOIN site s ON s.site_id = r.site_id \
         WHERE s.aggregator_id = $1 AND r.tariff_id = $2 AND r.site_id = $3 AND r.changed_time >= $4 \
         ORDER BY r.start_time ASC, r.tariff_generated_rate_id ASC OFFSET $5 LIMIT $6",
    )
    .bind(aggregator_id)
    .bind(tariff_id)
    .bind(site_id)
    .bind(params.after)
    .bind(params.start)
    .bind(params.limit)
    .fetch_all(pool)
    .await
}

/// Admin-supplied rate fields for a bulk upsert.
#[derive(Debug, Clone)]
pub struct RateUpsert {
    pub tariff_id: i64,
    pub site_id: i64,
    pub calculation_log_id: Option<i64>,
    pub start_time: OffsetDateTime,
    pub duration_seconds: i32,
    pub import_active_price: Decimal,
    pub export_active_price: Decimal,
    pub import_reactive_price: Decimal,
    pub export_reactive_price: Decimal,
}

/// Bulk upsert on the `(tariff_id, site_id, start_time)` natural key, with
/// prior row state archived first.
pub async fn upsert_rates(
    conn: &mut PgConnection,
    rates: &[RateUpsert],
    changed_time: OffsetDateTime,
) -> sqlx::Result<()> {
    for rate in rates {
        archive::copy_into_archive_by_id_and_time(
            conn,
            &specs::TARIFF_GENERATED_RATE,
            "site_id = $1 AND start_time = $2",
            rate.site_id,
            rate.start_time,
        )
        .await?;

        sqlx::query(
            "INSERT INTO tariff_generated_rate \
                 (tariff_id, site_id, calculation_log_id, start_time, duration_seconds, \
                  import_active_price, export_active_price, import_reactive_price, export_reactive_price, \
                  created_time, changed_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), $10) \
             ON CONFLICT (tariff_id, site_id, start_time) DO UPDATE SET \
                 calculation_log_id = excluded.calculation_log_id, \
                 duration_seconds = excluded.duration_seconds, \
                 import_active_price = excluded.import_active_price, \
                 export_active_price = excluded.export_active_price, \
                 import_reactive_price = excluded.import_reactive_price, \
                 export_reactive_price = excluded.export_reactive_price, \
                 changed_time = excluded.changed_time",
        )
        .bind(rate.tariff_id)
        .bind(rate.site_id)
        .bind(rate.calculation_log_id)
        .bind(rate.start_time)
        .bind(rate.duration_seconds)
        .bind(rate.import_active_price)
        .bind(rate.export_active_price)
        .bind(rate.import_reactive_price)
        .bind(rate.export_reactive_price)
        .bind(changed_time)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
