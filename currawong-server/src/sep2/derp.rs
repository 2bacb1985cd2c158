//! DER program, control and default-control wire types, with the CSIP-AUS
//! control-base extensions (opModImpLimW and friends).

use serde::{Deserialize, Serialize};

use super::{sep2_ns, ActivePower, DateTimeInterval, Link, ListLink};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DERProgram")]
pub struct DerProgram {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub primacy: i32,
    #[serde(rename = "DERControlListLink", skip_serializing_if = "Option::is_none")]
    pub der_control_list_link: Option<ListLink>,
    #[serde(rename = "ActiveDERControlListLink", skip_serializing_if = "Option::is_none")]
    pub active_der_control_list_link: Option<ListLink>,
    #[serde(rename = "DefaultDERControlLink", skip_serializing_if = "Option::is_none")]
    pub default_der_control_link: Option<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DERProgramList")]
pub struct DerProgramList {
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
    #[serde(rename = "DERProgram", default, skip_serializing_if = "Vec::is_empty")]
    pub der_programs: Vec<DerProgram>,
}

/// The CSIP-AUS control base: per-window import/export/generation/load
/// active power limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerControlBase {
    #[serde(rename = "opModImpLimW", skip_serializing_if = "Option::is_none")]
    pub op_mod_imp_lim_w: Option<ActivePower>,
    #[serde(rename = "opModExpLimW", skip_serializing_if = "Option::is_none")]
    pub op_mod_exp_lim_w: Option<ActivePower>,
    #[serde(rename = "opModGenLimW", skip_serializing_if = "Option::is_none")]
    pub op_mod_gen_lim_w: Option<ActivePower>,
    #[serde(rename = "opModLoadLimW", skip_serializing_if = "Option::is_none")]
    pub op_mod_load_lim_w: Option<ActivePower>,
    #[serde(rename = "opModEnergize", skip_serializing_if = "Option::is_none")]
    pub op_mod_energize: Option<bool>,
    #[serde(rename = "rampTms", skip_serializing_if = "Option::is_none")]
    pub ramp_tms: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DERControl")]
pub struct DerControl {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "creationTime")]
    pub creation_time: i64,
    #[serde(rename = "EventStatus", skip_serializing_if = "Option::is_none")]
    pub event_status: Option<EventStatus>,
    pub interval: DateTimeInterval,
    #[serde(rename = "DERControlBase")]
    pub der_control_base: DerControlBase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStatus {
    #[serde(rename = "currentStatus")]
    pub current_status: i32,
    #[serde(rename = "dateTime")]
    pub date_time: i64,
    #[serde(rename = "potentiallySuperseded")]
    pub potentially_superseded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DERControlList")]
pub struct DerControlList {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@all")]
    pub all: i64,
    #[serde(rename = "@results")]
    pub results: i64,
    #[serde(rename = "DERControl", default, skip_serializing_if = "Vec::is_empty")]
    pub der_controls: Vec<DerControl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DefaultDERControl")]
pub struct DefaultDerControl {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "setGradW", skip_serializing_if = "Option::is_none")]
    pub set_grad_w: Option<i32>,
    #[serde(rename = "DERControlBase")]
    pub der_control_base: DerControlBase,
}
