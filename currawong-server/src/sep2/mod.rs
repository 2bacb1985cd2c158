//! sep2 (IEEE 2030.5) XML wire types, bound with quick-xml + serde.
//!
//! Times are epoch seconds on the wire (sep2 TimeType); power and price
//! quantities carry an explicit power-of-ten multiplier.

pub mod der;
pub mod derp;
pub mod device_capability;
pub mod end_device;
pub mod error;
pub mod fsa;
pub mod log_event;
pub mod metering;
pub mod pricing;
pub mod pub_sub;
pub mod response;
pub mod time;

use serde::{Deserialize, Serialize};

pub const SEP2_NS: &str = "urn:ieee:std:2030.5:ns";
pub const CSIP_AUS_NS_V11A: &str = "https://csipaus.org/ns";
pub const CSIP_AUS_NS_V11: &str = "http://csipaus.org/ns";

pub fn sep2_ns() -> String {
    SEP2_NS.to_owned()
}

pub fn csip_ns() -> String {
    CSIP_AUS_NS_V11A.to_owned()
}

/// A hyperlink to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "@href")]
    pub href: String,
}

impl Link {
    pub fn new(href: String) -> Self {
        Self { href }
    }
}

/// A hyperlink to a list resource, advertising its size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListLink {
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@all", skip_serializing_if = "Option::is_none")]
    pub all: Option<i64>,
}

impl ListLink {
    pub fn new(href: String, all: Option<i64>) -> Self {
        Self { href, all }
    }
}

/// sep2 signed power value with power-of-ten multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePower {
    pub multiplier: i16,
    pub value: i64,
}

impl ActivePower {
    /// Encodes a decimal watt quantity at a fixed multiplier, truncating any
    /// precision beyond it.
    pub fn from_decimal_watts(watts: rust_decimal::Decimal, multiplier: i16) -> Self {
        let scale = rust_decimal::Decimal::from(10i64.pow(u32::from(multiplier.unsigned_abs())));
        let scaled = if multiplier >= 0 { watts / scale } else { watts * scale };
        Self {
            multiplier,
            value: scaled.trunc().try_into().unwrap_or(0),
        }
    }
}

/// sep2 DateTimeInterval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTimeInterval {
    pub duration: i64,
    pub start: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    use rust_decimal::Decimal;

    #[test]
    fn active_power_encodes_at_negative_multiplier() {
        // 1500.5 W at multiplier -2 is 150050 centiwatts.
        let power = ActivePower::from_decimal_watts(Decimal::new(15005, 1), -2);
        assert_eq!(power.value, 150050);
        assert_eq!(power.multiplier, -2);
    }

    #[test]
    fn active_power_truncates_at_positive_multiplier() {
        let power = ActivePower::from_decimal_watts(Decimal::from(1999), 3);
        assert_eq!(power.value, 1);
        assert_eq!(power.multiplier, 3);
    }
}
