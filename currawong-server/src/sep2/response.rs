//! Response function set wire types. DERControlResponse and PriceResponse
//! share the base Response shape; only their list context differs.

use serde::{Deserialize, Serialize};

use super::{sep2_ns, ListLink};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Response")]
pub struct Response {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "createdDateTime", skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<i64>,
    #[serde(rename = "endDeviceLFDI")]
    pub end_device_lfdi: String,
    #[serde(rename = "status", skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    /// MRID of the entity being acknowledged.
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "ResponseList")]
pub struct ResponseList {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@all")]
    pub all: i64,
    #[serde(rename = "@results")]
    pub results: i64,
    #[serde(rename = "Response", default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<Response>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "ResponseSet")]
pub struct ResponseSet {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "ResponseListLink", skip_serializing_if = "Option::is_none")]
    pub response_list_link: Option<ListLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "ResponseSetList")]
pub struct ResponseSetList {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@all")]
    pub all: i64,
    #[serde(rename = "@results")]
    pub results: i64,
    #[serde(rename = "ResponseSet", default, skip_serializing_if = "Vec::is_empty")]
    pub response_sets: Vec<ResponseSet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_response_parses_with_subject_mrid() {
        let xml = r#"<Response xmlns="urn:ieee:std:2030.5:ns">
            <endDeviceLFDI>3e4f45ab31edfe5b67e343e5e4562e31984e23e5</endDeviceLFDI>
            <status>1</status>
            <subject>3000027630000000000000000000002a</subject>
        </Response>"#;

        let parsed: Response = quick_xml::de::from_str(xml).expect("parses");
        assert_eq!(parsed.status, Some(1));
        assert!(parsed.created_date_time.is_none());
    }
}
