use serde::{Deserialize, Serialize};

use super::{sep2_ns, Link, ListLink};

/// sep2 EndDevice. The wire `sFDI` is decimal, `lFDI` hex, `deviceCategory`
/// a hex-rendered bitmask.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "EndDevice")]
pub struct EndDevice {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "deviceCategory", skip_serializing_if = "Option::is_none")]
    pub device_category: Option<String>,
    #[serde(rename = "lFDI", skip_serializing_if = "Option::is_none")]
    pub lfdi: Option<String>,
    #[serde(rename = "sFDI")]
    pub sfdi: i64,
    #[serde(rename = "changedTime", skip_serializing_if = "Option::is_none")]
    pub changed_time: Option<i64>,
    #[serde(rename = "enabled", skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "ConnectionPointLink", skip_serializing_if = "Option::is_none")]
    pub connection_point_link: Option<Link>,
    #[serde(rename = "DERListLink", skip_serializing_if = "Option::is_none")]
    pub der_list_link: Option<ListLink>,
    #[serde(rename = "DERProgramListLink", skip_serializing_if = "Option::is_none")]
    pub derp_list_link: Option<ListLink>,
    #[serde(rename = "FunctionSetAssignmentsListLink", skip_serializing_if = "Option::is_none")]
    pub fsa_list_link: Option<ListLink>,
    #[serde(rename = "RegistrationLink", skip_serializing_if = "Option::is_none")]
    pub registration_link: Option<Link>,
    #[serde(rename = "SubscriptionListLink", skip_serializing_if = "Option::is_none")]
    pub subscription_list_link: Option<ListLink>,
    #[serde(rename = "LogEventListLink", skip_serializing_if = "Option::is_none")]
    pub log_event_list_link: Option<ListLink>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "EndDeviceList")]
pub struct EndDeviceList {
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
    #[serde(rename = "EndDevice", default, skip_serializing_if = "Vec::is_empty")]
    pub end_devices: Vec<EndDevice>,
}

/// sep2 Registration: the out-of-band PIN a device operator uses to confirm
/// their EndDevice registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Registration")]
pub struct Registration {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "dateTimeRegistered")]
    pub date_time_registered: i64,
    #[serde(rename = "pIN")]
    pub pin: i32,
}

/// CSIP-AUS ConnectionPoint extension carrying the NMI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "ConnectionPoint")]
pub struct ConnectionPoint {
    #[serde(rename = "@xmlns", default = "super::csip_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "connectionPointId", skip_serializing_if = "Option::is_none")]
    pub connection_point_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_device_roundtrips_through_xml() {
        let device = EndDevice {
            xmlns: sep2_ns(),
            href: Some(String::from("/edev/3")),
            device_category: Some(String::from("2000000")),
            lfdi: Some(String::from("3e4f45ab31edfe5b67e343e5e4562e31984e23e5")),
            sfdi: 167_261_211_391,
            changed_time: Some(1_700_000_000),
            enabled: Some(true),
            ..EndDevice::default()
        };

        let xml = quick_xml::se::to_string(&device).expect("serializes");
        assert!(xml.contains(r#"<sFDI>167261211391</sFDI>"#));
        assert!(xml.contains(r#"deviceCategory>2000000<"#));

        let parsed: EndDevice = quick_xml::de::from_str(&xml).expect("parses");
        assert_eq!(parsed.sfdi, device.sfdi);
        assert_eq!(parsed.lfdi, device.lfdi);
    }

    #[test]
    fn client_posted_end_device_parses_without_links() {
        let xml = r#"<EndDevice xmlns="urn:ieee:std:2030.5:ns">
            <deviceCategory>2000000</deviceCategory>
            <lFDI>3E4F45AB31EDFE5B67E343E5E4562E31984E23E5</lFDI>
            <sFDI>167261211391</sFDI>
        </EndDevice>"#;

        let parsed: EndDevice = quick_xml::de::from_str(xml).expect("parses");
        assert_eq!(parsed.sfdi, 167_261_211_391);
        assert!(parsed.changed_time.is_none());
    }
}
