use serde::{Deserialize, Serialize};

use super::{sep2_ns, ListLink};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "FunctionSetAssignments")]
pub struct FunctionSetAssignments {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "DERProgramListLink", skip_serializing_if = "Option::is_none")]
    pub der_program_list_link: Option<ListLink>,
    #[serde(rename = "TariffProfileListLink", skip_serializing_if = "Option::is_none")]
    pub tariff_profile_list_link: Option<ListLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "FunctionSetAssignmentsList")]
pub struct FunctionSetAssignmentsList {
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
    #[serde(rename = "FunctionSetAssignments", default, skip_serializing_if = "Vec::is_empty")]
    pub function_set_assignments: Vec<FunctionSetAssignments>,
}
