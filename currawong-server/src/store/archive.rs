//! Copy-on-write archival.
//!
//! Every mutable live table has an archive twin holding the same columns
//! plus bookkeeping (`archive_id`, `archive_time`, `deleted_time`). Any
//! UPDATE first copies the pre-image into the archive; any DELETE moves the
//! row there with `deleted_time` stamped. Both run inside the transaction of
//! the calling mutation, so `archive write precedes mutation` holds
//! per-transaction.
//!
//! Operations are parameterized by an [`ArchiveSpec`] descriptor pairing the
//! live and archive table metadata.

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool};
use time::OffsetDateTime;

/// Static metadata tying a live table to its archive twin.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveSpec {
    pub source_table: &'static str,
    pub archive_table: &'static str,
    pub pk_column: &'static str,
    /// Every live column, primary key included. The archive bookkeeping
    /// columns are never listed here.
    pub columns: &'static [&'static str],
}

impl ArchiveSpec {
    fn column_list(&self) -> String {
        self.columns.join(", ")
    }

    /// `INSERT INTO archive (cols) SELECT cols FROM source WHERE ...`
    ///
    /// `archive_time` takes its database-side default of `now()`;
    /// `deleted_time` stays NULL, marking the copy as an update pre-image.
    pub fn copy_sql(&self, where_clause: &str) -> String {
        let cols = self.column_list();
        format!(
            "INSERT INTO {arch} ({cols}) SELECT {cols} FROM {src} WHERE {where_clause}",
            arch = self.archive_table,
            src = self.source_table,
        )
    }

    /// Single round-trip delete-and-archive: the deleted rows feed the
    /// archive insert through a CTE, with `deleted_time` as the final bind.
    pub fn delete_sql(&self, where_clause: &str, deleted_time_bind: usize) -> String {
        let cols = self.column_list();
        format!(
            "WITH deleted_rows AS (DELETE FROM {src} WHERE {where_clause} RETURNING {cols}) \
             INSERT INTO {arch} ({cols}, deleted_time) SELECT {cols}, ${deleted_time_bind} FROM deleted_rows",
            arch = self.archive_table,
            src = self.source_table,
        )
    }

    fn period_column(&self, only_deletes: bool) -> &'static str {
        if only_deletes {
            "deleted_time"
        } else {
            "archive_time"
        }
    }
}

/// Copies rows matching `where_clause` (with a single i64 bind at `$1`) into
/// the archive. Call before the UPDATE that replaces them.
pub async fn copy_into_archive(
    conn: &mut PgConnection,
    spec: &ArchiveSpec,
    where_clause: &str,
    bind: i64,
) -> sqlx::Result<()> {
    sqlx::query(&spec.copy_sql(where_clause))
        .bind(bind)
        .execute(conn)
        .await?;
    Ok(())
}

/// As [`copy_into_archive`] with an `(i64, timestamptz)` bind pair.
pub async fn copy_into_archive_by_id_and_time(
    conn: &mut PgConnection,
    spec: &ArchiveSpec,
    where_clause: &str,
    bind_id: i64,
    bind_time: OffsetDateTime,
) -> sqlx::Result<()> {
    sqlx::query(&spec.copy_sql(where_clause))
        .bind(bind_id)
        .bind(bind_time)
        .execute(conn)
        .await?;
    Ok(())
}

/// Deletes rows matching `where_clause` (single i64 bind at `$1`), moving
/// them to the archive stamped with `deleted_time`. One round trip.
pub async fn delete_into_archive(
    conn: &mut PgConnection,
    spec: &ArchiveSpec,
    where_clause: &str,
    bind: i64,
    deleted_time: OffsetDateTime,
) -> sqlx::Result<u64> {
    let result = sqlx::query(&spec.delete_sql(where_clause, 2))
        .bind(bind)
        .bind(deleted_time)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Counts archive rows for an `[period_start, period_end)` window, filtering
/// on `deleted_time` when `only_deletes` (which also excludes update
/// pre-images), `archive_time` otherwise.
pub async fn count_archive_for_period(
    pool: &PgPool,
    spec: &ArchiveSpec,
    period_start: OffsetDateTime,
    period_end: OffsetDateTime,
    only_deletes: bool,
) -> sqlx::Result<i64> {
    let column = spec.period_column(only_deletes);
    let sql = format!(
        "SELECT count(*) FROM {arch} WHERE {column} >= $1 AND {column} < $2",
        arch = spec.archive_table,
    );
    sqlx::query_scalar(&sql)
        .bind(period_start)
        .bind(period_end)
        .fetch_one(pool)
        .await
}

/// Pages archive rows for a period, ordered by `archive_id` ascending.
pub async fn select_archive_for_period<A>(
    pool: &PgPool,
    spec: &ArchiveSpec,
    start: i64,
    limit: i64,
    period_start: OffsetDateTime,
    period_end: OffsetDateTime,
    only_deletes: bool,
) -> sqlx::Result<Vec<A>>
where
    A: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let column = spec.period_column(only_deletes);
    let sql = format!(
        "SELECT * FROM {arch} WHERE {column} >= $1 AND {column} < $2 \
         ORDER BY archive_id ASC OFFSET $3 LIMIT $4",
        arch = spec.archive_table,
    );
    sqlx::query_as(&sql)
        .bind(period_start)
        .bind(period_end)
        .bind(start)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Re-fetch protocol for delete notifications: live rows first, then for any
/// missing id the single latest archived deletion so the notification can
/// carry the last-known state.
pub async fn fetch_with_archive_by_id<R, A>(
    conn: &mut PgConnection,
    spec: &ArchiveSpec,
    ids: &[i64],
) -> sqlx::Result<(Vec<R>, Vec<A>)>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin + HasResourceId,
    A: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let live_sql = format!(
        "SELECT * FROM {src} WHERE {pk} = ANY($1)",
        src = spec.source_table,
        pk = spec.pk_column,
    );
    let live: Vec<R> = sqlx::query_as(&live_sql).bind(ids).fetch_all(&mut *conn).await?;

    let found: std::collections::HashSet<i64> = live.iter().map(|row| row.resource_id()).collect();
    let missing: Vec<i64> = ids.iter().copied().filter(|id| !found.contains(id)).collect();
    if missing.is_empty() {
        return Ok((live, Vec::new()));
    }

    let archive_sql = format!(
        "SELECT DISTINCT ON ({pk}) * FROM {arch} \
         WHERE deleted_time IS NOT NULL AND {pk} = ANY($1) \
         ORDER BY {pk}, deleted_time DESC, archive_time DESC",
        arch = spec.archive_table,
        pk = spec.pk_column,
    );
    let archived: Vec<A> = sqlx::query_as(&archive_sql).bind(&missing).fetch_all(conn).await?;

    Ok((live, archived))
}

/// Live rows carrying their primary key, for the re-fetch protocol.
pub trait HasResourceId {
    fn resource_id(&self) -> i64;
}

impl HasResourceId for crate::model::Site {
    fn resource_id(&self) -> i64 {
        self.site_id
    }
}

impl HasResourceId for crate::model::DynamicOperatingEnvelope {
    fn resource_id(&self) -> i64 {
        self.dynamic_operating_envelope_id
    }
}

impl HasResourceId for crate::model::TariffGeneratedRate {
    fn resource_id(&self) -> i64 {
        self.tariff_generated_rate_id
    }
}

impl HasResourceId for crate::model::SiteReading {
    fn resource_id(&self) -> i64 {
        self.site_reading_id
    }
}

/// Descriptors for every archived table.
pub mod specs {
    use super::ArchiveSpec;

    pub const SITE: ArchiveSpec = ArchiveSpec {
        source_table: "site",
        archive_table: "archive_site",
        pk_column: "site_id",
        columns: &[
            "site_id",
            "aggregator_id",
            "lfdi",
            "sfdi",
            "device_category",
            "timezone_id",
            "nmi",
            "registration_pin",
            "created_time",
            "changed_time",
        ],
    };

    pub const DEFAULT_SITE_CONTROL: ArchiveSpec = ArchiveSpec {
        source_table: "default_site_control",
        archive_table: "archive_default_site_control",
        pk_column: "default_site_control_id",
        columns: &[
            "default_site_control_id",
            "site_id",
            "import_limit_active_watts",
            "export_limit_active_watts",
            "generation_limit_active_watts",
            "load_limit_active_watts",
            "ramp_rate_percent_per_second",
            "created_time",
            "changed_time",
        ],
    };

    pub const SITE_CONTROL_GROUP: ArchiveSpec = ArchiveSpec {
        source_table: "site_control_group",
        archive_table: "archive_site_control_group",
        pk_column: "site_control_group_id",
        columns: &[
            "site_control_group_id",
            "description",
            "primacy",
            "version",
            "import_limit_active_watts",
            "export_limit_active_watts",
            "generation_limit_active_watts",
            "load_limit_active_watts",
            "set_energized",
            "ramp_rate_percent_per_second",
            "created_time",
            "changed_time",
        ],
    };

    pub const DOE: ArchiveSpec = ArchiveSpec {
        source_table: "dynamic_operating_envelope",
        archive_table: "archive_dynamic_operating_envelope",
        pk_column: "dynamic_operating_envelope_id",
        columns: &[
            "dynamic_operating_envelope_id",
            "site_id",
            "site_control_group_id",
            "calculation_log_id",
            "start_time",
            "duration_seconds",
            "end_time",
            "import_limit_active_watts",
            "export_limit_active_watts",
            "generation_limit_active_watts",
            "load_limit_active_watts",
            "set_energized",
            "ramp_rate_percent_per_second",
            "superseded",
            "created_time",
            "changed_time",
        ],
    };

    pub const TARIFF_GENERATED_RATE: ArchiveSpec = ArchiveSpec {
        source_table: "tariff_generated_rate",
        archive_table: "archive_tariff_generated_rate",
        pk_column: "tariff_generated_rate_id",
        columns: &[
            "tariff_generated_rate_id",
            "tariff_id",
            "site_id",
            "calculation_log_id",
            "start_time",
            "duration_seconds",
            "import_active_price",
            "export_active_price",
            "import_reactive_price",
            "export_reactive_price",
            "created_time",
            "changed_time",
        ],
    };

    pub const SITE_READING_TYPE: ArchiveSpec = ArchiveSpec {
        source_table: "site_reading_type",
        archive_table: "archive_site_reading_type",
        pk_column: "site_reading_type_id",
        columns: &[
            "site_reading_type_id",
            "aggregator_id",
            "site_id",
            "mup_lfdi",
            "uom",
            "data_qualifier",
            "flow_direction",
            "accumulation_behaviour",
            "kind",
            "phase",
            "power_of_ten_multiplier",
            "default_interval_seconds",
            "created_time",
            "changed_time",
        ],
    };

    pub const SITE_READING: ArchiveSpec = ArchiveSpec {
        source_table: "site_reading",
        archive_table: "archive_site_reading",
        pk_column: "site_reading_id",
        columns: &[
            "site_reading_id",
            "site_reading_type_id",
            "local_id",
            "quality_flags",
            "time_period_start",
            "time_period_seconds",
            "value",
            "created_time",
            "changed_time",
        ],
    };

    pub const SUBSCRIPTION: ArchiveSpec = ArchiveSpec {
        source_table: "subscription",
        archive_table: "archive_subscription",
        pk_column: "subscription_id",
        columns: &[
            "subscription_id",
            "aggregator_id",
            "resource_type",
            "resource_id",
            "scoped_site_id",
            "notification_uri",
            "entity_limit",
            "created_time",
            "changed_time",
        ],
    };

    pub const SUBSCRIPTION_CONDITION: ArchiveSpec = ArchiveSpec {
        source_table: "subscription_condition",
        archive_table: "archive_subscription_condition",
        pk_column: "subscription_condition_id",
        columns: &[
            "subscription_condition_id",
            "subscription_id",
            "attribute",
            "lower_threshold",
            "upper_threshold",
        ],
    };

    pub const SITE_DER: ArchiveSpec = ArchiveSpec {
        source_table: "site_der",
        archive_table: "archive_site_der",
        pk_column: "site_der_id",
        columns: &["site_der_id", "site_id", "created_time", "changed_time"],
    };

    pub const SITE_DER_RATING: ArchiveSpec = ArchiveSpec {
        source_table: "site_der_rating",
        archive_table: "archive_site_der_rating",
        pk_column: "site_der_rating_id",
        columns: &[
            "site_der_rating_id",
            "site_der_id",
            "modes_supported",
            "der_type",
            "max_w_value",
            "max_w_multiplier",
            "max_va_value",
            "max_va_multiplier",
            "max_var_value",
            "max_var_multiplier",
            "v_nom_value",
            "v_nom_multiplier",
            "changed_time",
        ],
    };

    pub const SITE_DER_SETTING: ArchiveSpec = ArchiveSpec {
        source_table: "site_der_setting",
        archive_table: "archive_site_der_setting",
        pk_column: "site_der_setting_id",
        columns: &[
            "site_der_setting_id",
            "site_der_id",
            "modes_enabled",
            "max_w_value",
            "max_w_multiplier",
            "max_va_value",
            "max_va_multiplier",
            "max_var_value",
            "max_var_multiplier",
            "grad_w",
            "changed_time",
        ],
    };

    pub const SITE_DER_AVAILABILITY: ArchiveSpec = ArchiveSpec {
        source_table: "site_der_availability",
        archive_table: "archive_site_der_availability",
        pk_column: "site_der_availability_id",
        columns: &[
            "site_der_availability_id",
            "site_der_id",
            "availability_duration_sec",
            "max_charge_duration_sec",
            "reserved_charge_percent",
            "reserved_deliver_percent",
            "estimated_w_avail_value",
            "estimated_w_avail_multiplier",
            "changed_time",
        ],
    };

    pub const SITE_DER_STATUS: ArchiveSpec = ArchiveSpec {
        source_table: "site_der_status",
        archive_table: "archive_site_der_status",
        pk_column: "site_der_status_id",
        columns: &[
            "site_der_status_id",
            "site_der_id",
            "operational_mode_status",
            "generator_connect_status",
            "inverter_status",
            "alarm_status",
            "state_of_charge_status",
            "changed_time",
        ],
    };

    pub const SITE_LOG_EVENT: ArchiveSpec = ArchiveSpec {
        source_table: "site_log_event",
        archive_table: "archive_site_log_event",
        pk_column: "site_log_event_id",
        columns: &[
            "site_log_event_id",
            "site_id",
            "function_set",
            "log_event_code",
            "log_event_pen",
            "profile_id",
            "details",
            "created_time",
        ],
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    use expect_test::expect;

    #[test]
    fn copy_sql_mirrors_live_columns_only() {
        let sql = specs::SITE.copy_sql("site_id = $1");
        expect![[r#"INSERT INTO archive_site (site_id, aggregator_id, lfdi, sfdi, device_category, timezone_id, nmi, registration_pin, created_time, changed_time) SELECT site_id, aggregator_id, lfdi, sfdi, device_category, timezone_id, nmi, registration_pin, created_time, changed_time FROM site WHERE site_id = $1"#]].assert_eq(&sql);
        assert!(!sql.contains("archive_time"));
        assert!(!sql.contains("deleted_time"));
    }

    #[test]
    fn delete_sql_is_a_single_statement_with_deleted_time() {
        let sql = specs::DOE.delete_sql("site_id = $1", 2);
        assert!(sql.starts_with("WITH deleted_rows AS (DELETE FROM dynamic_operating_envelope"));
        assert!(sql.contains("RETURNING"));
        assert!(sql.contains("deleted_time) SELECT"));
        assert!(sql.ends_with("$2 FROM deleted_rows"));
    }

    #[test]
    fn period_filter_column_tracks_only_deletes() {
        assert_eq!(specs::SITE.period_column(false), "archive_time");
        assert_eq!(specs::SITE.period_column(true), "deleted_time");
    }

    #[test]
    fn every_spec_lists_its_pk_column() {
        for spec in [
            specs::SITE,
            specs::DEFAULT_SITE_CONTROL,
            specs::SITE_CONTROL_GROUP,
            specs::DOE,
            specs::TARIFF_GENERATED_RATE,
            specs::SITE_READING_TYPE,
            specs::SITE_READING,
            specs::SUBSCRIPTION,
            specs::SUBSCRIPTION_CONDITION,
            specs::SITE_DER,
            specs::SITE_DER_RATING,
            specs::SITE_DER_SETTING,
            specs::SITE_DER_AVAILABILITY,
            specs::SITE_DER_STATUS,
            specs::SITE_LOG_EVENT,
        ] {
            assert!(
                spec.columns.contains(&spec.pk_column),
                "{} is missing its own pk",
                spec.source_table
            );
        }
    }
}
