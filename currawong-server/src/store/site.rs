use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;

use crate::config::DefaultDoeConfiguration;
use crate::http::ServiceError;
use crate::model::{DefaultSiteControl, Site};
use crate::store::archive::{self, specs};
use crate::store::ListParams;

pub async fn select_aggregator_site_count(
    pool: &PgPool,
    aggregator_id: i64,
    after: OffsetDateTime,
) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT count(*) FROM site WHERE aggregator_id = $1 AND changed_time >= $2")
        .bind(aggregator_id)
        .bind(after)
        .fetch_one(pool)
        .await
}

/// Sites for an aggregator, ordered per sep2 list convention
/// (`changedTime DESC` then `sfdi ASC`).
pub async fn select_sites_for_aggregator(
    pool: &PgPool,
    aggregator_id: i64,
    params: ListParams,
) -> sqlx::Result<Vec<Site>> {
    sqlx::query_as(
        "SELECT * FROM site WHERE aggregator_id = $1 AND changed_time >= $2 \
         ORDER BY changed_time DESC, sfdi ASC OFFSET $3 LIMIT $4",
    )
    .bind(aggregator_id)
    .bind(params.after)
    .bind(params.start)
    .bind(params.limit)
    .fetch_all(pool)
    .await
}

/// Both ids are required so an aggregator can never see another tenant's site.
pub async fn select_site_by_id(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_id: i64,
) -> sqlx::Result<Option<Site>> {
    sqlx::query_as("SELECT * FROM site WHERE aggregator_id = $1 AND site_id = $2")
        .bind(aggregator_id)
        .bind(site_id)
        .fetch_optional(conn)
        .await
}

pub async fn select_site_by_sfdi(
    conn: &mut PgConnection,
    aggregator_id: i64,
    sfdi: i64,
) -> sqlx::Result<Option<Site>> {
    sqlx::query_as("SELECT * FROM site WHERE aggregator_id = $1 AND sfdi = $2")
        .bind(aggregator_id)
        .bind(sfdi)
        .fetch_optional(conn)
        .await
}

/// Fields supplied by an EndDevice registration.
#[derive(Debug, Clone)]
pub struct SiteRegistration {
    pub aggregator_id: i64,
    pub lfdi: String,
    pub sfdi: i64,
    pub device_category: i64,
    pub timezone_id: String,
    pub registration_pin: i32,
    pub changed_time: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub site_id: i64,
    pub created: bool,
}

/// Registers an EndDevice as a site, idempotently.
///
/// A matching `(aggregator_id, sfdi)` row is updated in place (its pre-image
/// archived first) and reports `created: false`; a colliding LFDI/SFDI under
/// a different aggregator is a Conflict.
pub async fn upsert_site(
    conn: &mut PgConnection,
    registration: &SiteRegistration,
) -> Result<RegistrationOutcome, ServiceError> {
    let clashes: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT site_id, aggregator_id FROM site WHERE lower(lfdi) = lower($1) OR sfdi = $2",
    )
    .bind(&registration.lfdi)
    .bind(registration.sfdi)
    .fetch_all(&mut *conn)
    .await?;

    if clashes
        .iter()
        .any(|(_, aggregator_id)| *aggregator_id != registration.aggregator_id)
    {
        return Err(ServiceError::conflict(format!(
            "lfdi {} is registered to another aggregator",
            registration.lfdi
        )));
    }

    // Archive the pre-image when this lands as an update.
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT site_id FROM site WHERE aggregator_id = $1 AND sfdi = $2")
            .bind(registration.aggregator_id)
            .bind(registration.sfdi)
            .fetch_optional(&mut *conn)
            .await?;
    if let Some(site_id) = existing {
        archive::copy_into_archive(conn, &specs::SITE, "site_id = $1", site_id).await?;
    }

    // The update arm leaves registration_pin, nmi and created_time alone.
    let (site_id, created): (i64, bool) = sqlx::query_as(
        "INSERT INTO site \
             (aggregator_id, lfdi, sfdi, device_category, timezone_id, registration_pin, created_time, changed_time) \
         VALUES ($1, $2, $3, $4, $5, $6, now(), $7) \
         ON CONFLICT (aggregator_id, sfdi) DO UPDATE SET \
             lfdi = excluded.lfdi, \
             device_category = excluded.device_category, \
             timezone_id = excluded.timezone_id, \
             changed_time = excluded.changed_time \
         RETURNING site_id, (xmax = 0) AS created",
    )
    .bind(registration.aggregator_id)
    .bind(&registration.lfdi)
    .bind(registration.sfdi)
    .bind(registration.device_category)
    .bind(&registration.timezone_id)
    .bind(registration.registration_pin)
    .bind(registration.changed_time)
    .fetch_one(conn)
    .await?;

    Ok(RegistrationOutcome { site_id, created })
}

pub async fn update_site_nmi(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_id: i64,
    nmi: Option<&str>,
    changed_time: OffsetDateTime,
) -> Result<(), ServiceError> {
    archive::copy_into_archive(conn, &specs::SITE, "site_id = $1", site_id).await?;

    let result = sqlx::query(
        "UPDATE site SET nmi = $3, changed_time = $4 WHERE aggregator_id = $1 AND site_id = $2",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(nmi)
    .bind(changed_time)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound);
    }
    Ok(())
}

/// Deletes a site and everything underneath it, archiving each row with the
/// shared `deleted_time`. Returns false if the site isn't in scope.
pub async fn delete_site(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_id: i64,
    deleted_time: OffsetDateTime,
) -> Result<bool, ServiceError> {
    if select_site_by_id(conn, aggregator_id, site_id).await?.is_none() {
        return Ok(false);
    }

    const BY_SITE: &str = "site_id = $1";
    const READINGS_OF_SITE: &str =
        "site_reading_type_id IN (SELECT site_reading_type_id FROM site_reading_type WHERE site_id = $1)";
    const CONDITIONS_OF_SITE: &str =
        "subscription_id IN (SELECT subscription_id FROM subscription WHERE scoped_site_id = $1)";
    const SUBSCRIPTIONS_OF_SITE: &str = "scoped_site_id = $1";
    const DER_CHILD_OF_SITE: &str =
        "site_der_id IN (SELECT site_der_id FROM site_der WHERE site_id = $1)";

    archive::delete_into_archive(conn, &specs::SITE_DER_RATING, DER_CHILD_OF_SITE, site_id, deleted_time).await?;
    archive::delete_into_archive(conn, &specs::SITE_DER_SETTING, DER_CHILD_OF_SITE, site_id, deleted_time).await?;
    archive::delete_into_archive(conn, &specs::SITE_DER_AVAILABILITY, DER_CHILD_OF_SITE, site_id, deleted_time)
        .await?;
    archive::delete_into_archive(conn, &specs::SITE_DER_STATUS, DER_CHILD_OF_SITE, site_id, deleted_time).await?;
    archive::delete_into_archive(conn, &specs::SITE_DER, BY_SITE, site_id, deleted_time).await?;
    archive::delete_into_archive(conn, &specs::SITE_READING, READINGS_OF_SITE, site_id, deleted_time).await?;
    archive::delete_into_archive(conn, &specs::SITE_READING_TYPE, BY_SITE, site_id, deleted_time).await?;
    archive::delete_into_archive(conn, &specs::TARIFF_GENERATED_RATE, BY_SITE, site_id, deleted_time).await?;
    archive::delete_into_archive(conn, &specs::DOE, BY_SITE, site_id, deleted_time).await?;
    archive::delete_into_archive(conn, &specs::SUBSCRIPTION_CONDITION, CONDITIONS_OF_SITE, site_id, deleted_time)
        .await?;
    archive::delete_into_archive(conn, &specs::SUBSCRIPTION, SUBSCRIPTIONS_OF_SITE, site_id, deleted_time).await?;
    archive::delete_into_archive(conn, &specs::SITE_LOG_EVENT, BY_SITE, site_id, deleted_time).await?;
    archive::delete_into_archive(conn, &specs::DEFAULT_SITE_CONTROL, BY_SITE, site_id, deleted_time).await?;

    let removed =
        archive::delete_into_archive(conn, &specs::SITE, "site_id = $1", site_id, deleted_time).await?;

    Ok(removed > 0)
}

pub async fn select_default_site_control(
    conn: &mut PgConnection,
    site_id: i64,
) -> sqlx::Result<Option<DefaultSiteControl>> {
    sqlx::query_as("SELECT * FROM default_site_control WHERE site_id = $1")
        .bind(site_id)
        .fetch_optional(conn)
        .await
}

pub async fn upsert_default_site_control(
    conn: &mut PgConnection,
    site_id: i64,
    control: &DefaultDoeConfiguration,
    changed_time: OffsetDateTime,
) -> sqlx::Result<()> {
    archive::copy_into_archive(conn, &specs::DEFAULT_SITE_CONTROL, "site_id = $1", site_id).await?;

    sqlx::query(
        "INSERT INTO default_site_control \
             (site_id, import_limit_active_watts, export_limit_active_watts, \
              generation_limit_active_watts, load_limit_active_watts, \
              ramp_rate_percent_per_second, created_time, changed_time) \
         VALUES ($1, $2, $3, $4, $5, $6, now(), $7) \
         ON CONFLICT (site_id) DO UPDATE SET \
             import_limit_active_watts = excluded.import_limit_active_watts, \
             export_limit_active_watts = excluded.export_limit_active_watts, \
             generation_limit_active_watts = excluded.generation_limit_active_watts, \
             load_limit_active_watts = excluded.load_limit_active_watts, \
             ramp_rate_percent_per_second = excluded.ramp_rate_percent_per_second, \
             changed_time = excluded.changed_time",
    )
    .bind(site_id)
    .bind(control.import_limit_active_watts)
    .bind(control.export_limit_active_watts)
    .bind(control.generation_limit_active_watts)
    .bind(control.load_limit_active_watts)
    .bind(control.ramp_rate_percent_per_second)
    .bind(changed_time)
    .execute(conn)
    .await?;

    Ok(())
}

/// Merges the default control sources, field by field: the per-site value
/// wins when set, the global configuration backfills, and a field missing
/// from both is absent. `None` means nothing at all is configured (which
/// callers surface as NotFound).
pub fn resolve_default_control(
    per_site: Option<&DefaultSiteControl>,
    global: &DefaultDoeConfiguration,
) -> Option<DefaultDoeConfiguration> {
    let merged = DefaultDoeConfiguration {
        import_limit_active_watts: per_site
            .and_then(|c| c.import_limit_active_watts)
            .or(global.import_limit_active_watts),
        export_limit_active_watts: per_site
            .and_then(|c| c.export_limit_active_watts)
            .or(global.export_limit_active_watts),
        generation_limit_active_watts: per_site
            .and_then(|c| c.generation_limit_active_watts)
            .or(global.generation_limit_active_watts),
        load_limit_active_watts: per_site
            .and_then(|c| c.load_limit_active_watts)
            .or(global.load_limit_active_watts),
        ramp_rate_percent_per_second: per_site
            .and_then(|c| c.ramp_rate_percent_per_second)
            .or(global.ramp_rate_percent_per_second),
    };

    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rust_decimal::Decimal;

    fn per_site(import: Option<i64>) -> DefaultSiteControl {
        DefaultSiteControl {
            default_site_control_id: 1,
            site_id: 1,
            import_limit_active_watts: import.map(Decimal::from),
            export_limit_active_watts: None,
            generation_limit_active_watts: None,
            load_limit_active_watts: None,
            ramp_rate_percent_per_second: None,
            created_time: OffsetDateTime::UNIX_EPOCH,
            changed_time: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn per_site_field_wins_and_global_backfills() {
        let global = DefaultDoeConfiguration {
            import_limit_active_watts: Some(Decimal::from(99)),
            export_limit_active_watts: Some(Decimal::from(50)),
            ..DefaultDoeConfiguration::default()
        };

        let merged = resolve_default_control(Some(&per_site(Some(10))), &global).expect("merged");
        assert_eq!(merged.import_limit_active_watts, Some(Decimal::from(10)));
        assert_eq!(merged.export_limit_active_watts, Some(Decimal::from(50)));
        assert_eq!(merged.generation_limit_active_watts, None);
    }

    #[test]
    fn fully_null_inputs_resolve_to_none() {
        let global = DefaultDoeConfiguration::default();
        assert_eq!(resolve_default_control(None, &global), None);
        assert_eq!(resolve_default_control(Some(&per_site(None)), &global), None);
    }

    #[test]
    fn global_only_still_resolves() {
        let global = DefaultDoeConfiguration {
            export_limit_active_watts: Some(Decimal::from(1500)),
            ..DefaultDoeConfiguration::default()
        };
        let merged = resolve_default_control(None, &global).expect("merged");
        assert_eq!(merged.export_limit_active_watts, Some(Decimal::from(1500)));
    }
}
