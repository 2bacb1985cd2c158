use sqlx::PgConnection;
use time::OffsetDateTime;

use crate::model::der::{SiteDer, SiteDerAvailability, SiteDerRating, SiteDerSetting, SiteDerStatus};
use crate::store::archive::{self, specs};

/// Fetches the site's DER row, creating it lazily on first touch (CSIP-AUS
/// has at most one logical DER per site).
pub async fn ensure_site_der(
    conn: &mut PgConnection,
    site_id: i64,
    changed_time: OffsetDateTime,
) -> sqlx::Result<SiteDer> {
    if let Some(existing) = select_site_der(conn, site_id).await? {
        return Ok(existing);
    }

    sqlx::query_as(
        "INSERT INTO site_der (site_id, created_time, changed_time) VALUES ($1, now(), $2) \
         ON CONFLICT (site_id) DO UPDATE SET changed_time = site_der.changed_time \
         RETURNING *",
    )
    .bind(site_id)
    .bind(changed_time)
    .fetch_one(conn)
    .await
}

pub async fn select_site_der(conn: &mut PgConnection, site_id: i64) -> sqlx::Result<Option<SiteDer>> {
    sqlx::query_as("SELECT * FROM site_der WHERE site_id = $1")
        .bind(site_id)
        .fetch_optional(conn)
        .await
}

pub async fn select_der_rating(
    conn: &mut PgConnection,
    site_der_id: i64,
) -> sqlx::Result<Option<SiteDerRating>> {
    sqlx::query_as("SELECT * FROM site_der_rating WHERE site_der_id = $1")
        .bind(site_der_id)
        .fetch_optional(conn)
        .await
}

/// Replaces the rating facet wholesale (PUT semantics); the pre-image is
/// archived first.
pub async fn upsert_der_rating(conn: &mut PgConnection, row: &SiteDerRating) -> sqlx::Result<()> {
    archive::copy_into_archive(conn, &specs::SITE_DER_RATING, "site_der_id = $1", row.site_der_id).await?;

    sqlx::query(
        "INSERT INTO site_der_rating \
             (site_der_id, modes_supported, der_type, max_w_value, max_w_multiplier, \
              max_va_value, max_va_multiplier, max_var_value, max_var_multiplier, \
              v_nom_value, v_nom_multiplier, changed_time) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (site_der_id) DO UPDATE SET \
             modes_supported = excluded.modes_supported, \
             der_type = excluded.der_type, \
             max_w_value = excluded.max_w_value, \
             max_w_multiplier = excluded.max_w_multiplier, \
             max_va_value = excluded.max_va_value, \
             max_va_multiplier = excluded.max_va_multiplier, \
             max_var_value = excluded.max_var_value, \
             max_var_multiplier = excluded.max_var_multiplier, \
             v_nom_value = excluded.v_nom_value, \
             v_nom_multiplier = excluded.v_nom_multiplier, \
             changed_time = excluded.changed_time",
    )
    .bind(row.site_der_id)
    .bind(row.modes_supported)
    .bind(row.der_type)
    .bind(row.max_w_value)
    .bind(row.max_w_multiplier)
    .bind(row.max_va_value)
    .bind(row.max_va_multiplier)
    .bind(row.max_var_value)
    .bind(row.max_var_multiplier)
    .bind(row.v_nom_value)
    .bind(row.v_nom_multiplier)
    .bind(row.changed_time)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn select_der_setting(
    conn: &mut PgConnection,
    site_der_id: i64,
) -> sqlx::Result<Option<SiteDerSetting>> {
    sqlx::query_as("SELECT * FROM site_der_setting WHERE site_der_id = $1")
        .bind(site_der_id)
        .fetch_optional(conn)
        .await
}

pub async fn upsert_der_setting(conn: &mut PgConnection, row: &SiteDerSetting) -> sqlx::Result<()> {
    archive::copy_into_archive(conn, &specs::SITE_DER_SETTING, "site_der_id = $1", row.site_der_id).await?;

    sqlx::query(
        "INSERT INTO site_der_setting \
             (site_der_id, modes_enabled, max_w_value, max_w_multiplier, max_va_value, max_va_multiplier, \
              max_var_value, max_var_multiplier, grad_w, changed_time) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (site_der_id) DO UPDATE SET \
             modes_enabled = excluded.modes_enabled, \
             max_w_value = excluded.max_w_value, \
             max_w_multiplier = excluded.max_w_multiplier, \
             max_va_value = excluded.max_va_value, \
             max_va_multiplier = excluded.max_va_multiplier, \
             max_var_value = excluded.max_var_value, \
             max_var_multiplier = excluded.max_var_multiplier, \
             grad_w = excluded.grad_w, \
             changed_time = excluded.changed_time",
    )
    .bind(row.site_der_id)
    .bind(row.modes_enabled)
    .bind(row.max_w_value)
    .bind(row.max_w_multiplier)
    .bind(row.max_va_value)
    .bind(row.max_va_multiplier)
    .bind(row.max_var_value)
    .bind(row.max_var_multiplier)
    .bind(row.grad_w)
    .bind(row.changed_time)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn select_der_availability(
    conn: &mut PgConnection,
    site_der_id: i64,
) -> sqlx::Result<Option<SiteDerAvailability>> {
    sqlx::query_as("SELECT * FROM site_der_availability WHERE site_der_id = $1")
        .bind(site_der_id)
        .fetch_optional(conn)
        .await
}

pub async fn upsert_der_availability(
    conn: &mut PgConnection,
    row: &SiteDerAvailability,
) -> sqlx::Result<()> {
    archive::copy_into_archive(conn, &specs::SITE_DER_AVAILABILITY, "site_der_id = $1", row.site_der_id)
        .await?;

    sqlx::query(
        "INSERT INTO site_der_availability \
             (site_der_id, availability_duration_sec, max_charge_duration_sec, reserved_charge_percent, \
              reserved_deliver_percent, estimated_w_avail_value, estimated_w_avail_multiplier, changed_time) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (site_der_id) DO UPDATE SET \
             availability_duration_sec = excluded.availability_duration_sec, \
             max_charge_duration_sec = excluded.max_charge_duration_sec, \
             reserved_charge_percent = excluded.reserved_charge_percent, \
             reserved_deliver_percent = excluded.reserved_deliver_percent, \
             estimated_w_avail_value = excluded.estimated_w_avail_value, \
             estimated_w_avail_multiplier = excluded.estimated_w_avail_multiplier, \
             changed_time = excluded.changed_time",
    )
    .bind(row.site_der_id)
    .bind(row.availability_duration_sec)
    .bind(row.max_charge_duration_sec)
    .bind(row.reserved_charge_percent)
    .bind(row.reserved_deliver_percent)
    .bind(row.estimated_w_avail_value)
    .bind(row.estimated_w_avail_multiplier)
    .bind(row.changed_time)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn select_der_status(
    conn: &mut PgConnection,
    site_der_id: i64,
) -> sqlx::Result<Option<SiteDerStatus>> {
    sqlx::query_as("SELECT * FROM site_der_status WHERE site_der_id = $1")
        .bind(site_der_id)
        .fetch_optional(conn)
        .await
}

pub async fn upsert_der_status(conn: &mut PgConnection, row: &SiteDerStatus) -> sqlx::Result<()> {
    archive::copy_into_archive(conn, &specs::SITE_DER_STATUS, "site_der_id = $1", row.site_der_id).await?;

    sqlx::query(
        "INSERT INTO site_der_status \
             (site_der_id, operational_mode_status, generator_connect_status, inverter_status, \
              alarm_status, state_of_charge_status, changed_time) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (site_der_id) DO UPDATE SET \
             operational_mode_status = excluded.operational_mode_status, \
             generator_connect_status = excluded.generator_connect_status, \
             inverter_status = excluded.inverter_status, \
             alarm_status = excluded.alarm_status, \
             state_of_charge_status = excluded.state_of_charge_status, \
             changed_time = excluded.changed_time",
    )
    .bind(row.site_der_id)
    .bind(row.operational_mode_status)
    .bind(row.generator_connect_status)
    .bind(row.inverter_status)
    .bind(row.alarm_status)
    .bind(row.state_of_charge_status)
    .bind(row.changed_time)
    .execute(conn)
    .await?;

    Ok(())
}
