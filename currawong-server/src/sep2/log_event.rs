use serde::{Deserialize, Serialize};

use super::sep2_ns;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "LogEvent")]
pub struct LogEvent {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "createdDateTime", skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<i64>,
    #[serde(rename = "details", skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "extendedData", skip_serializing_if = "Option::is_none")]
    pub extended_data: Option<String>,
    #[serde(rename = "functionSet")]
    pub function_set: i32,
    #[serde(rename = "logEventCode")]
    pub log_event_code: i32,
    #[serde(rename = "logEventID")]
    pub log_event_id: i64,
    #[serde(rename = "logEventPEN")]
    pub log_event_pen: i32,
    #[serde(rename = "profileID")]
    pub profile_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "LogEventList")]
pub struct LogEventList {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@all")]
    pub all: i64,
    #[serde(rename = "@results")]
    pub results: i64,
    #[serde(rename = "LogEvent", default, skip_serializing_if = "Vec::is_empty")]
    pub log_events: Vec<LogEvent>,
}
