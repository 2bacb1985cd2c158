//! Read-side row types for the archive tables that are consulted after the
//! fact (period audits and delete notifications). Archive twins that are only
//! ever written (readings, subscriptions, log events, DER facets) don't need
//! a struct: their copies are produced entirely inside SQL.

use rust_decimal::Decimal;
use time::OffsetDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArchiveSite {
    pub archive_id: i64,
    pub archive_time: OffsetDateTime,
    pub deleted_time: Option<OffsetDateTime>,
    pub site_id: i64,
    pub aggregator_id: i64,
    pub lfdi: String,
    pub sfdi: i64,
    pub device_category: i64,
    pub timezone_id: String,
    pub nmi: Option<String>,
    pub registration_pin: i32,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArchiveDynamicOperatingEnvelope {
    pub archive_id: i64,
    pub archive_time: OffsetDateTime,
    pub deleted_time: Option<OffsetDateTime>,
    pub dynamic_operating_envelope_id: i64,
    pub site_id: i64,
    pub site_control_group_id: i64,
    pub calculation_log_id: Option<i64>,
    pub start_time: OffsetDateTime,
    pub duration_seconds: i32,
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

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArchiveTariffGeneratedRate {
    pub archive_id: i64,
    pub archive_time: OffsetDateTime,
    pub deleted_time: Option<OffsetDateTime>,
    pub tariff_generated_rate_id: i64,
    pub tariff_id: i64,
    pub site_id: i64,
    pub calculation_log_id: Option<i64>,
    pub start_time: OffsetDateTime,
    pub duration_seconds: i32,
    pub import_active_price: Decimal,
    pub export_active_price: Decimal,
    pub import_reactive_price: Decimal,
    pub export_reactive_price: Decimal,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}
