//! Tariff rate wire types. A TariffGeneratedRate fans out to one
//! TimeTariffInterval per pricing reading flavour; the interval's mRID embeds
//! `(rate_id, pricing_reading_type)` so client responses correlate back.

use serde::{Deserialize, Serialize};

use super::{sep2_ns, DateTimeInterval};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "TimeTariffInterval")]
pub struct TimeTariffInterval {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "creationTime")]
    pub creation_time: i64,
    pub interval: DateTimeInterval,
    #[serde(rename = "touTier")]
    pub tou_tier: i32,
    /// Price in 10^`pricePowerOfTenMultiplier` dollars per kWh (kvarh for
    /// reactive flavours).
    pub price: i64,
    #[serde(rename = "pricePowerOfTenMultiplier")]
    pub price_power_of_ten_multiplier: i16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "TariffProfile")]
pub struct TariffProfile {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "currency")]
    pub currency: i32,
    #[serde(rename = "pricePowerOfTenMultiplier")]
    pub price_power_of_ten_multiplier: i16,
    #[serde(rename = "rateCode", skip_serializing_if = "Option::is_none")]
    pub rate_code: Option<String>,
    #[serde(rename = "RateComponentListLink", skip_serializing_if = "Option::is_none")]
    pub rate_component_list_link: Option<super::ListLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "TariffProfileList")]
pub struct TariffProfileList {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@all")]
    pub all: i64,
    #[serde(rename = "@results")]
    pub results: i64,
    #[serde(rename = "TariffProfile", default, skip_serializing_if = "Vec::is_empty")]
    pub tariff_profiles: Vec<TariffProfile>,
}

/// One pricing reading flavour under a tariff profile for a single site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "RateComponent")]
pub struct RateComponent {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "TimeTariffIntervalListLink", skip_serializing_if = "Option::is_none")]
    pub time_tariff_interval_list_link: Option<super::ListLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "RateComponentList")]
pub struct RateComponentList {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@all")]
    pub all: i64,
    #[serde(rename = "@results")]
    pub results: i64,
    #[serde(rename = "RateComponent", default, skip_serializing_if = "Vec::is_empty")]
    pub rate_components: Vec<RateComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "TimeTariffIntervalList")]
pub struct TimeTariffIntervalList {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@all")]
    pub all: i64,
    #[serde(rename = "@results")]
    pub results: i64,
    #[serde(rename = "TimeTariffInterval", default, skip_serializing_if = "Vec::is_empty")]
    pub time_tariff_intervals: Vec<TimeTariffInterval>,
}
