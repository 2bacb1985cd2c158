use time::OffsetDateTime;

/// The per-site DER resource. CSIP-AUS allows at most one logical DER per
/// site; a missing row is served as a synthetic default.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SiteDer {
    pub site_der_id: i64,
    pub site_id: i64,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}

/// Nameplate ratings (sep2 DERCapability).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SiteDerRating {
    pub site_der_rating_id: i64,
    pub site_der_id: i64,
    pub modes_supported: Option<i64>,
    pub der_type: i32,
    pub max_w_value: i32,
    pub max_w_multiplier: i16,
    pub max_va_value: Option<i32>,
    pub max_va_multiplier: Option<i16>,
    pub max_var_value: Option<i32>,
    pub max_var_multiplier: Option<i16>,
    pub v_nom_value: Option<i32>,
    pub v_nom_multiplier: Option<i16>,
    pub changed_time: OffsetDateTime,
}

/// Present operational settings (sep2 DERSettings).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SiteDerSetting {
    pub site_der_setting_id: i64,
    pub site_der_id: i64,
    pub modes_enabled: Option<i64>,
    pub max_w_value: i32,
    pub max_w_multiplier: i16,
    pub max_va_value: Option<i32>,
    pub max_va_multiplier: Option<i16>,
    pub max_var_value: Option<i32>,
    pub max_var_multiplier: Option<i16>,
    pub grad_w: i32,
    pub changed_time: OffsetDateTime,
}

/// Availability estimate (sep2 DERAvailability).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SiteDerAvailability {
    pub site_der_availability_id: i64,
    pub site_der_id: i64,
    pub availability_duration_sec: Option<i32>,
    pub max_charge_duration_sec: Option<i32>,
    pub reserved_charge_percent: Option<i32>,
    pub reserved_deliver_percent: Option<i32>,
    pub estimated_w_avail_value: Option<i32>,
    pub estimated_w_avail_multiplier: Option<i16>,
    pub changed_time: OffsetDateTime,
}

/// Present status (sep2 DERStatus).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SiteDerStatus {
    pub site_der_status_id: i64,
    pub site_der_id: i64,
    pub operational_mode_status: Option<i32>,
    pub generator_connect_status: Option<i32>,
    pub inverter_status: Option<i32>,
    pub alarm_status: Option<i64>,
    pub state_of_charge_status: Option<i32>,
    pub changed_time: OffsetDateTime,
}
