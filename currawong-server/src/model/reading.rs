use time::OffsetDateTime;

/// Pins the measurement semantics of a mirror usage point channel. Readings
/// are stored raw; callers apply `power_of_ten_multiplier` and the
/// flow-direction sign.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SiteReadingType {
    pub site_reading_type_id: i64,
    pub aggregator_id: i64,
    pub site_id: i64,
    /// Mirror usage point device LFDI as supplied at registration.
    pub mup_lfdi: String,
    pub uom: i32,
    pub data_qualifier: i32,
    pub flow_direction: i32,
    pub accumulation_behaviour: i32,
    pub kind: i32,
    pub phase: i32,
    pub power_of_ten_multiplier: i16,
    pub default_interval_seconds: i32,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}

/// One telemetry sample. Unique on `(site_reading_type_id, time_period_start)`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SiteReading {
    pub site_reading_id: i64,
    pub site_reading_type_id: i64,
    pub local_id: Option<i32>,
    pub quality_flags: i32,
    pub time_period_start: OffsetDateTime,
    pub time_period_seconds: i32,
    pub value: i64,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}
