use rust_decimal::Decimal;
use time::OffsetDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tariff {
    pub tariff_id: i64,
    pub name: String,
    pub dnsp_code: String,
    /// ISO 4217 numeric currency code (36 = AUD).
    pub currency_code: i32,
    pub fsa_id: i64,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}

/// A per-site time-stamped price tuple under a tariff.
/// Unique on `(tariff_id, site_id, start_time)`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TariffGeneratedRate {
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
