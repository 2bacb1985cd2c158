use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;

use crate::model::{ArchiveDynamicOperatingEnvelope, DynamicOperatingEnvelope, SiteControlGroup};
use crate::store::archive::{self, specs};
use crate::store::ListParams;

/// Admin-supplied DOE fields for a bulk upsert.
#[derive(Debug, Clone)]
pub struct DoeUpsert {
    pub site_id: i64,
    pub site_control_group_id: i64,
    pub calculation_log_id: Option<i64>,
    pub start_time: OffsetDateTime,
    pub duration_seconds: i32,
    pub import_limit_active_watts: Option<Decimal>,
    pub export_limit_active_watts: Option<Decimal>,
    pub generation_limit_active_watts: Option<Decimal>,
    pub load_limit_active_watts: Option<Decimal>,
    pub set_energized: Option<bool>,
    pub ramp_rate_percent_per_second: Option<i16>,
    pub superseded: bool,
}

impl DoeUpsert {
    /// `end_time` is denormalized from start/duration, preserving the
    /// start_time offset.
    pub fn end_time(&self) -> OffsetDateTime {
        self.start_time + time::Duration::seconds(i64::from(self.duration_seconds))
    }
}

/// Bulk upsert on the `(site_id, start_time)` natural key. Prior row state
/// is copied to the archive before each overwrite.
pub async fn upsert_does(
    conn: &mut PgConnection,
    does: &[DoeUpsert],
    changed_time: OffsetDateTime,
) -> sqlx::Result<()> {
    for doe in does {
        archive::copy_into_archive_by_id_and_time(
            conn,
            &specs::DOE,
            "site_id = $1 AND start_time = $2",
            doe.site_id,
            doe.start_time,
        )
        .await?;

        sqlx::query(
            "INSERT INTO dynamic_operating_envelope \
                 (site_id, site_control_group_id, calculation_log_id, start_time, duration_seconds, end_time, \
                  import_limit_active_watts, export_limit_active_watts, generation_limit_active_watts, \
                  load_limit_active_watts, set_energized, ramp_rate_percent_per_second, superseded, \
                  created_time, changed_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, now(), $14) \
             ON CONFLICT (site_id, start_time) DO UPDATE SET \
                 site_control_group_id = excluded.site_control_group_id, \
                 calculation_log_id = excluded.calculation_log_id, \
                 duration_seconds = excluded.duration_seconds, \
                 end_time = excluded.end_time, \
                 import_limit_active_watts = excluded.import_limit_active_watts, \
                 export_limit_active_watts = excluded.export_limit_active_watts, \
                 generation_limit_active_watts = excluded.generation_limit_active_watts, \
                 load_limit_active_watts = excluded.load_limit_active_watts, \
                 set_energized = excluded.set_energized, \
                 ramp_rate_percent_per_second = excluded.ramp_rate_percent_per_second, \
                 superseded = excluded.superseded, \
                 changed_time = excluded.changed_time",
        )
        .bind(doe.site_id)
        .bind(doe.site_control_group_id)
        .bind(doe.calculation_log_id)
        .bind(doe.start_time)
        .bind(doe.duration_seconds)
        .bind(doe.end_time())
        .bind(doe.import_limit_active_watts)
        .bind(doe.export_limit_active_watts)
        .bind(doe.generation_limit_active_watts)
        .bind(doe.load_limit_active_watts)
        .bind(doe.set_energized)
        .bind(doe.ramp_rate_percent_per_second)
        .bind(doe.superseded)
        .bind(changed_time)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Fetches one DOE, constrained to the aggregator (and optionally a single
/// site) so out-of-scope ids read as absent.
pub async fn select_doe_for_scope(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_id: Option<i64>,
    doe_id: i64,
) -> sqlx::Result<Option<DynamicOperatingEnvelope>> {
    sqlx::query_as(
        "SELECT d.* FROM dynamic_operating_envelope d \
         JOIN site s ON s.site_id = d.site_id \
         WHERE s.aggregator_id = $1 AND d.dynamic_operating_envelope_id = $2 \
           AND ($3::bigint IS NULL OR d.site_id = $3)",
    )
    .bind(aggregator_id)
    .bind(doe_id)
    .bind(site_id)
    .fetch_optional(conn)
    .await
}

pub async fn select_does_for_site(
    pool: &PgPool,
    aggregator_id: i64,
    site_id: i64,
    params: ListParams,
) -> sqlx::Result<Vec<DynamicOperatingEnvelope>> {
    sqlx::query_as(
        "SELECT d.* FROM dynamic_operating_envelope d \
         JOIN site s ON s.site_id = d.site_id \
         WHERE s.aggregator_id = $1 AND d.site_id = $2 AND d.changed_time >= $3 \
         ORDER BY d.start_time ASC, d.dynamic_operating_envelope_id ASC OFFSET $4 LIMIT $5",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(params.after)
    .bind(params.start)
    .bind(params.limit)
    .fetch_all(pool)
    .await
}

pub async fn count_does_for_site(
    pool: &PgPool,
    aggregator_id: i64,
    site_id: i64,
    after: OffsetDateTime,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "SELECT count(*) FROM dynamic_operating_envelope d \
         JOIN site s ON s.site_id = d.site_id \
         WHERE s.aggregator_id = $1 AND d.site_id = $2 AND d.changed_time >= $3",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(after)
    .fetch_one(pool)
    .await
}

/// A DOE as served to clients: possibly an archived (deleted) row, in which
/// case `deleted_time` says when it went away.
#[derive(Debug, Clone)]
pub struct DoeWithDeleted {
    pub doe: DynamicOperatingEnvelope,
    pub deleted_time: Option<OffsetDateTime>,
}

impl From<ArchiveDynamicOperatingEnvelope> for DoeWithDeleted {
    fn from(row: ArchiveDynamicOperatingEnvelope) -> Self {
        DoeWithDeleted {
            doe: DynamicOperatingEnvelope {
                dynamic_operating_envelope_id: row.dynamic_operating_envelope_id,
                site_id: row.site_id,
                site_control_group_id: row.site_control_group_id,
                calculation_log_id: row.calculation_log_id,
                start_time: row.start_time,
                duration_seconds: row.duration_seconds,
                end_time: row.end_time,
                import_limit_active_watts: row.import_limit_active_watts,
                export_limit_active_watts: row.export_limit_active_watts,
                generation_limit_active_watts: row.generation_limit_active_watts,
                load_limit_active_watts: row.load_limit_active_watts,
                set_energized: row.set_energized,
                ramp_rate_percent_per_second: row.ramp_rate_percent_per_second,
                superseded: row.superseded,
                created_time: row.created_time,
                changed_time: row.changed_time,
            },
            deleted_time: row.deleted_time,
        }
    }
}

/// Merges the two DOE sources a client of the "active" control list sees:
/// live envelopes whose window covers `now`, and archived envelopes deleted
/// after the client's `after` watermark. The union is ordered
/// `start_time ASC, id ASC`, stable under concurrent deletion while a
/// client paginates.
pub async fn select_active_does_include_deleted(
    conn: &mut PgConnection,
    aggregator_id: i64,
    site_id: i64,
    now: OffsetDateTime,
    params: ListParams,
) -> sqlx::Result<Vec<DoeWithDeleted>> {
    let live: Vec<DynamicOperatingEnvelope> = sqlx::query_as(
        "SELECT d.* FROM dynamic_operating_envelope d \
         JOIN site s ON s.site_id = d.site_id \
         WHERE s.aggregator_id = $1 AND d.site_id = $2 \
           AND d.start_time <= $3 AND d.end_time > $3",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;

    let deleted: Vec<ArchiveDynamicOperatingEnvelope> = sqlx::query_as(
        "SELECT DISTINCT ON (a.dynamic_operating_envelope_id) a.* \
         FROM archive_dynamic_operating_envelope a \
         WHERE a.site_id = $1 AND a.deleted_time > $2 \
         ORDER BY a.dynamic_operating_envelope_id, a.deleted_time DESC, a.archive_time DESC",
    )
    .bind(site_id)
    .bind(params.after)
    .fetch_all(conn)
    .await?;

    let mut merged: Vec<DoeWithDeleted> = live
        .into_iter()
        .map(|doe| DoeWithDeleted { doe, deleted_time: None })
        .chain(deleted.into_iter().map(DoeWithDeleted::from))
        .collect();

    merged.sort_by(|a, b| {
        (a.doe.start_time, a.doe.dynamic_operating_envelope_id)
            .cmp(&(b.doe.start_time, b.doe.dynamic_operating_envelope_id))
    });

    let start = usize::try_from(params.start).unwrap_or(0);
    let limit = usize::try_from(params.limit).unwrap_or(0);
    Ok(merged.into_iter().skip(start).take(limit).collect())
}

pub async fn select_site_control_groups(pool: &PgPool, params: ListParams) -> sqlx::Result<Vec<SiteControlGroup>> {
    sqlx::query_as(
        "SELECT * FROM site_control_group WHERE changed_time >= $1 \
         ORDER BY primacy ASC, site_control_group_id ASC OFFSET $2 LIMIT $3",
    )
    .bind(params.after)
    .bind(params.start)
    .bind(params.limit)
    .fetch_all(pool)
    .await
}

pub async fn count_site_control_groups(pool: &PgPool, after: OffsetDateTime) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT count(*) FROM site_control_group WHERE changed_time >= $1")
        .bind(after)
        .fetch_one(pool)
        .await
}

pub async fn select_site_control_group_by_id(
    conn: &mut PgConnection,
    site_control_group_id: i64,
) -> sqlx::Result<Option<SiteControlGroup>> {
    sqlx::query_as("SELECT * FROM site_control_group WHERE site_control_group_id = $1")
        .bind(site_control_group_id)
        .fetch_optional(conn)
        .await
}

/// Replaces a group's default-control vector, archiving the prior row and
/// bumping `version`.
pub async fn update_site_control_group_defaults(
    conn: &mut PgConnection,
    site_control_group_id: i64,
    defaults: &crate::config::DefaultDoeConfiguration,
    set_energized: Option<bool>,
    changed_time: OffsetDateTime,
) -> sqlx::Result<bool> {
    archive::copy_into_archive(
        conn,
        &specs::SITE_CONTROL_GROUP,
        "site_control_group_id = $1",
        site_control_group_id,
    )
    .await?;

    let result = sqlx::query(
        "UPDATE site_control_group SET \
             import_limit_active_watts = $2, \
             export_limit_active_watts = $3, \
             generation_limit_active_watts = $4, \
             load_limit_active_watts = $5, \
             set_energized = $6, \
             ramp_rate_percent_per_second = $7, \
             version = version + 1, \
             changed_time = $8 \
         WHERE site_control_group_id = $1",
    )
    .bind(site_control_group_id)
    .bind(defaults.import_limit_active_watts)
    .bind(defaults.export_limit_active_watts)
    .bind(defaults.generation_limit_active_watts)
    .bind(defaults.load_limit_active_watts)
    .bind(set_energized)
    .bind(defaults.ramp_rate_percent_per_second)
    .bind(changed_time)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::datetime;

    #[test]
    fn end_time_preserves_the_start_offset() {
        let upsert = DoeUpsert {
            site_id: 1,
            site_control_group_id: 1,
            calculation_log_id: None,
            start_time: datetime!(2024-01-01 00:00 +10),
            duration_seconds: 3600,
            import_limit_active_watts: None,
            export_limit_active_watts: None,
            generation_limit_active_watts: None,
            load_limit_active_watts: None,
            set_energized: None,
            ramp_rate_percent_per_second: None,
            superseded: false,
        };

        let end = upsert.end_time();
        assert_eq!(end, datetime!(2024-01-01 01:00 +10));
        assert_eq!(end.offset(), upsert.start_time.offset());
    }
}
