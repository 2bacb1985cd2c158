//! Subscription and Notification wire types.

use serde::{Deserialize, Serialize};

use super::sep2_ns;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "attributeIdentifier")]
    pub attribute_identifier: i32,
    #[serde(rename = "lowerThreshold")]
    pub lower_threshold: i64,
    #[serde(rename = "upperThreshold")]
    pub upper_threshold: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Subscription")]
pub struct Subscription {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "subscribedResource")]
    pub subscribed_resource: String,
    #[serde(rename = "Condition", skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(rename = "encoding")]
    pub encoding: i32,
    #[serde(rename = "level")]
    pub level: String,
    #[serde(rename = "limit")]
    pub limit: i32,
    #[serde(rename = "notificationURI")]
    pub notification_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "SubscriptionList")]
pub struct SubscriptionList {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@all")]
    pub all: i64,
    #[serde(rename = "@results")]
    pub results: i64,
    #[serde(rename = "Subscription", default, skip_serializing_if = "Vec::is_empty")]
    pub subscriptions: Vec<Subscription>,
}

/// sep2 notification status values.
pub const NOTIFICATION_STATUS_DEFAULT: i32 = 0;
pub const NOTIFICATION_STATUS_DELETED: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_request_parses() {
        let xml = r#"<Subscription xmlns="urn:ieee:std:2030.5:ns">
            <subscribedResource>/edev/3/derp/1/doe/derc</subscribedResource>
            <encoding>0</encoding>
            <level>+S1</level>
            <limit>10</limit>
            <notificationURI>https://aggregator.example.com/hook</notificationURI>
        </Subscription>"#;

        let parsed: Subscription = quick_xml::de::from_str(xml).expect("parses");
        assert_eq!(parsed.limit, 10);
        assert_eq!(parsed.notification_uri, "https://aggregator.example.com/hook");
        assert!(parsed.condition.is_none());
    }
}
