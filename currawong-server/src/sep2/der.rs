//! DER resource facets (capability, settings, availability, status).

use serde::{Deserialize, Serialize};

use super::{sep2_ns, ActivePower, Link};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DER")]
pub struct Der {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "DERCapabilityLink", skip_serializing_if = "Option::is_none")]
    pub der_capability_link: Option<Link>,
    #[serde(rename = "DERSettingsLink", skip_serializing_if = "Option::is_none")]
    pub der_settings_link: Option<Link>,
    #[serde(rename = "DERAvailabilityLink", skip_serializing_if = "Option::is_none")]
    pub der_availability_link: Option<Link>,
    #[serde(rename = "DERStatusLink", skip_serializing_if = "Option::is_none")]
    pub der_status_link: Option<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DERList")]
pub struct DerList {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@all")]
    pub all: i64,
    #[serde(rename = "@results")]
    pub results: i64,
    #[serde(rename = "pollRate", skip_serializing_if = "Option::is_none")]
    pub poll_rate: Option<i32>,
    #[serde(rename = "DER", default, skip_serializing_if = "Vec::is_empty")]
    pub ders: Vec<Der>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "DERCapability")]
pub struct DerCapability {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "modesSupported", skip_serializing_if = "Option::is_none")]
    pub modes_supported: Option<String>,
    #[serde(rename = "rtgMaxW", skip_serializing_if = "Option::is_none")]
    pub rtg_max_w: Option<ActivePower>,
    #[serde(rename = "rtgMaxVA", skip_serializing_if = "Option::is_none")]
    pub rtg_max_va: Option<ActivePower>,
    #[serde(rename = "rtgMaxVar", skip_serializing_if = "Option::is_none")]
    pub rtg_max_var: Option<ActivePower>,
    #[serde(rename = "rtgVNom", skip_serializing_if = "Option::is_none")]
    pub rtg_v_nom: Option<ActivePower>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub der_type: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "DERSettings")]
pub struct DerSettings {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "modesEnabled", skip_serializing_if = "Option::is_none")]
    pub modes_enabled: Option<String>,
    #[serde(rename = "setGradW")]
    pub set_grad_w: i32,
    #[serde(rename = "setMaxW", skip_serializing_if = "Option::is_none")]
    pub set_max_w: Option<ActivePower>,
    #[serde(rename = "setMaxVA", skip_serializing_if = "Option::is_none")]
    pub set_max_va: Option<ActivePower>,
    #[serde(rename = "setMaxVar", skip_serializing_if = "Option::is_none")]
    pub set_max_var: Option<ActivePower>,
    #[serde(rename = "updatedTime", skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "DERAvailability")]
pub struct DerAvailability {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "availabilityDuration", skip_serializing_if = "Option::is_none")]
    pub availability_duration: Option<i32>,
    #[serde(rename = "maxChargeDuration", skip_serializing_if = "Option::is_none")]
    pub max_charge_duration: Option<i32>,
    #[serde(rename = "reserveChargePercent", skip_serializing_if = "Option::is_none")]
    pub reserve_charge_percent: Option<i32>,
    #[serde(rename = "reservePercent", skip_serializing_if = "Option::is_none")]
    pub reserve_percent: Option<i32>,
    #[serde(rename = "statWAvail", skip_serializing_if = "Option::is_none")]
    pub stat_w_avail: Option<ActivePower>,
    #[serde(rename = "readingTime", skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "DERStatus")]
pub struct DerStatus {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "genConnectStatus", skip_serializing_if = "Option::is_none")]
    pub gen_connect_status: Option<ValueWithTime>,
    #[serde(rename = "inverterStatus", skip_serializing_if = "Option::is_none")]
    pub inverter_status: Option<ValueWithTime>,
    #[serde(rename = "operationalModeStatus", skip_serializing_if = "Option::is_none")]
    pub operational_mode_status: Option<ValueWithTime>,
    #[serde(rename = "stateOfChargeStatus", skip_serializing_if = "Option::is_none")]
    pub state_of_charge_status: Option<ValueWithTime>,
    #[serde(rename = "readingTime", skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<i64>,
}

/// sep2 status value + the instant it was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueWithTime {
    #[serde(rename = "dateTime")]
    pub date_time: i64,
    pub value: i32,
}
