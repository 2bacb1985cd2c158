use rust_decimal::Decimal;
use time::OffsetDateTime;

/// A named bucket of site controls with a sep2 primacy (lower wins) and an
/// optional default-control vector. Default mutations bump `version` and
/// archive the prior row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SiteControlGroup {
    pub site_control_group_id: i64,
    pub description: String,
    pub primacy: i32,
    pub version: i32,
    pub import_limit_active_watts: Option<Decimal>,
    pub export_limit_active_watts: Option<Decimal>,
    pub generation_limit_active_watts: Option<Decimal>,
    pub load_limit_active_watts: Option<Decimal>,
    pub set_energized: Option<bool>,
    pub ramp_rate_percent_per_second: Option<i16>,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}

/// A time-bounded import/export active-power limit for one site.
/// Unique on `(site_id, start_time)`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DynamicOperatingEnvelope {
    pub dynamic_operating_envelope_id: i64,
    pub site_id: i64,
    pub site_control_group_id: i64,
    pub calculation_log_id: Option<i64>,
    pub start_time: OffsetDateTime,
    pub duration_seconds: i32,
    /// Denormalized `start_time + duration_seconds`, kept in step on upsert.
    pub end_time: OffsetDateTime,
    pub import_limit_active_watts: Option<Decimal>,
    pub export_limit_active_watts: Option<Decimal>,
    pub generation_limit_active_watts: Option<Decimal>,
    pub load_limit_active_watts: Option<Decimal>,
    pub set_energized: Option<bool>,
    pub ramp_rate_percent_per_second: Option<i16>,
    pub superseded: bool,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}

impl DynamicOperatingEnvelope {
    /// Whether the control window covers `t` (`start_time <= t < end_time`).
    pub fn is_active_at(&self, t: OffsetDateTime) -> bool {
        self.start_time <= t && t < self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::datetime;

    fn doe(start: OffsetDateTime, duration_seconds: i32) -> DynamicOperatingEnvelope {
        DynamicOperatingEnvelope {
            dynamic_operating_envelope_id: 1,
            site_id: 1,
            site_control_group_id: 1,
            calculation_log_id: None,
            start_time: start,
            duration_seconds,
            end_time: start + time::Duration::seconds(i64::from(duration_seconds)),
            import_limit_active_watts: Some(Decimal::new(15000, 1)),
            export_limit_active_watts: None,
            generation_limit_active_watts: None,
            load_limit_active_watts: None,
            set_energized: None,
            ramp_rate_percent_per_second: None,
            superseded: false,
            created_time: start,
            changed_time: start,
        }
    }

    #[test]
    fn active_window_is_half_open() {
        let start = datetime!(2024-01-01 00:00 +10);
        let envelope = doe(start, 300);

        assert!(!envelope.is_active_at(start - time::Duration::seconds(1)));
        assert!(envelope.is_active_at(start));
        assert!(envelope.is_active_at(start + time::Duration::seconds(299)));
        assert!(!envelope.is_active_at(start + time::Duration::seconds(300)));
    }
}
