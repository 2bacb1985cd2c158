use rust_decimal::Decimal;
use time::OffsetDateTime;

bitflags::bitflags! {
    /// sep2 DeviceCategoryType bitmask (a 32-bit hex string on the wire).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceCategory: u32 {
        const PROGRAMMABLE_COMMUNICATING_THERMOSTAT = 1;
        const STRIP_HEATERS = 1 << 1;
        const WATER_HEATER = 1 << 2;
        const POOL_PUMP = 1 << 3;
        const SAUNA = 1 << 4;
        const HOT_TUB = 1 << 5;
        const SMART_APPLIANCE = 1 << 6;
        const IRRIGATION_PUMP = 1 << 7;
        const MANAGED_COMMERCIAL_AND_INDUSTRIAL_LOADS = 1 << 8;
        const SIMPLE_MISC_LOADS = 1 << 9;
        const EXTERIOR_LIGHTING = 1 << 10;
        const INTERIOR_LIGHTING = 1 << 11;
        const LOAD_CONTROL_SWITCH = 1 << 12;
        const ENERGY_MANAGEMENT_SYSTEM = 1 << 13;
        const SMART_ENERGY_MODULE = 1 << 14;
        const ELECTRIC_VEHICLE = 1 << 15;
        const EVSE = 1 << 16;
        const VIRTUAL_OR_MIXED_DER = 1 << 17;
        const RECIPROCATING_ENGINE = 1 << 18;
        const FUEL_CELL = 1 << 19;
        const PHOTOVOLTAIC_SYSTEM = 1 << 20;
        const COMBINED_HEAT_AND_POWER = 1 << 21;
        const COMBINED_PV_AND_STORAGE = 1 << 22;
        const OTHER_GENERATION_SYSTEM = 1 << 23;
        const OTHER_STORAGE_SYSTEM = 1 << 24;
    }
}

impl DeviceCategory {
    /// Parses the sep2 hex-string rendering, retaining unknown bits.
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        u32::from_str_radix(hex_str, 16).ok().map(Self::from_bits_retain)
    }

    pub fn to_hex(self) -> String {
        format!("{:x}", self.bits())
    }
}

/// The physical/logical premise behind an EndDevice, owned by exactly one
/// aggregator. Unique on `(aggregator_id, sfdi)`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Site {
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

impl Site {
    pub fn device_category(&self) -> DeviceCategory {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        DeviceCategory::from_bits_retain(self.device_category as u32)
    }
}

/// Per-site default control limits, taking precedence over the globally
/// configured fallback when both are set.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DefaultSiteControl {
    pub default_site_control_id: i64,
    pub site_id: i64,
    pub import_limit_active_watts: Option<Decimal>,
    pub export_limit_active_watts: Option<Decimal>,
    pub generation_limit_active_watts: Option<Decimal>,
    pub load_limit_active_watts: Option<Decimal>,
    pub ramp_rate_percent_per_second: Option<i16>,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}

impl Default for Site {
    fn default() -> Self {
        Site {
            site_id: 0,
            aggregator_id: 0,
            lfdi: String::new(),
            sfdi: 0,
            device_category: 0,
            timezone_id: String::from("Australia/Brisbane"),
            nmi: None,
            registration_pin: 0,
            created_time: OffsetDateTime::UNIX_EPOCH,
            changed_time: OffsetDateTime::UNIX_EPOCH,
        }
    }
}
