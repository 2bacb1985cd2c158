use serde::{Deserialize, Serialize};

use super::sep2_ns;

/// Server time served at `/tm`. Quality 4 = server synchronized to an
/// external authoritative source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Time")]
pub struct Time {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "currentTime")]
    pub current_time: i64,
    #[serde(rename = "dstEndTime")]
    pub dst_end_time: i64,
    #[serde(rename = "dstOffset")]
    pub dst_offset: i32,
    #[serde(rename = "dstStartTime")]
    pub dst_start_time: i64,
    #[serde(rename = "quality")]
    pub quality: i32,
    #[serde(rename = "tzOffset")]
    pub tz_offset: i32,
}
