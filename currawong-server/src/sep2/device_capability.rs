use serde::{Deserialize, Serialize};

use super::{sep2_ns, Link, ListLink};

/// The discovery root served at `/dcap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DeviceCapability")]
pub struct DeviceCapability {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "pollRate", skip_serializing_if = "Option::is_none")]
    pub poll_rate: Option<i32>,
    #[serde(rename = "EndDeviceListLink", skip_serializing_if = "Option::is_none")]
    pub end_device_list_link: Option<ListLink>,
    #[serde(rename = "MirrorUsagePointListLink", skip_serializing_if = "Option::is_none")]
    pub mirror_usage_point_list_link: Option<ListLink>,
    #[serde(rename = "TimeLink", skip_serializing_if = "Option::is_none")]
    pub time_link: Option<Link>,
}
