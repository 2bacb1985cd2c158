//! Mirror usage point and meter reading wire types.

use serde::{Deserialize, Serialize};

use super::sep2_ns;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingType {
    #[serde(rename = "accumulationBehaviour", skip_serializing_if = "Option::is_none")]
    pub accumulation_behaviour: Option<i32>,
    #[serde(rename = "commodity", skip_serializing_if = "Option::is_none")]
    pub commodity: Option<i32>,
    #[serde(rename = "dataQualifier", skip_serializing_if = "Option::is_none")]
    pub data_qualifier: Option<i32>,
    #[serde(rename = "flowDirection", skip_serializing_if = "Option::is_none")]
    pub flow_direction: Option<i32>,
    #[serde(rename = "intervalLength", skip_serializing_if = "Option::is_none")]
    pub interval_length: Option<i32>,
    #[serde(rename = "kind", skip_serializing_if = "Option::is_none")]
    pub kind: Option<i32>,
    #[serde(rename = "phase", skip_serializing_if = "Option::is_none")]
    pub phase: Option<i32>,
    #[serde(rename = "powerOfTenMultiplier", skip_serializing_if = "Option::is_none")]
    pub power_of_ten_multiplier: Option<i16>,
    #[serde(rename = "uom", skip_serializing_if = "Option::is_none")]
    pub uom: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DateTimeIntervalType {
    pub duration: i64,
    pub start: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "localID", skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    #[serde(rename = "qualityFlags", skip_serializing_if = "Option::is_none")]
    pub quality_flags: Option<String>,
    #[serde(rename = "timePeriod", skip_serializing_if = "Option::is_none")]
    pub time_period: Option<DateTimeIntervalType>,
    pub value: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorMeterReading {
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "lastUpdateTime", skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<i64>,
    #[serde(rename = "ReadingType", skip_serializing_if = "Option::is_none")]
    pub reading_type: Option<ReadingType>,
    #[serde(rename = "Reading", default, skip_serializing_if = "Vec::is_empty")]
    pub readings: Vec<Reading>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "MirrorUsagePoint")]
pub struct MirrorUsagePoint {
    #[serde(rename = "@xmlns", default = "sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "@href", skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "mRID")]
    pub mrid: String,
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "deviceLFDI")]
    pub device_lfdi: String,
    #[serde(rename = "postRate", skip_serializing_if = "Option::is_none")]
    pub post_rate: Option<i32>,
    #[serde(rename = "roleFlags", skip_serializing_if = "Option::is_none")]
    pub role_flags: Option<String>,
    #[serde(rename = "serviceCategoryKind", skip_serializing_if = "Option::is_none")]
    pub service_category_kind: Option<i32>,
    #[serde(rename = "status", skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    #[serde(rename = "MirrorMeterReading", default, skip_serializing_if = "Vec::is_empty")]
    pub mirror_meter_readings: Vec<MirrorMeterReading>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "MirrorUsagePointList")]
pub struct MirrorUsagePointList {
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
    #[serde(rename = "MirrorUsagePoint", default, skip_serializing_if = "Vec::is_empty")]
    pub mirror_usage_points: Vec<MirrorUsagePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_usage_point_with_readings_parses() {
        let xml = r#"<MirrorUsagePoint xmlns="urn:ieee:std:2030.5:ns">
            <mRID>4075DE6031E562ACF4</mRID>
            <deviceLFDI>3e4f45ab31edfe5b67e343e5e4562e31984e23e5</deviceLFDI>
            <MirrorMeterReading>
                <mRID>10000000000000000001</mRID>
                <ReadingType>
                    <flowDirection>1</flowDirection>
                    <powerOfTenMultiplier>3</powerOfTenMultiplier>
                    <uom>38</uom>
                </ReadingType>
                <Reading>
                    <timePeriod><duration>300</duration><start>1700000000</start></timePeriod>
                    <value>1500</value>
                </Reading>
            </MirrorMeterReading>
        </MirrorUsagePoint>"#;

        let parsed: MirrorUsagePoint = quick_xml::de::from_str(xml).expect("parses");
        assert_eq!(parsed.mirror_meter_readings.len(), 1);
        let mmr = &parsed.mirror_meter_readings[0];
        assert_eq!(mmr.reading_type.as_ref().and_then(|rt| rt.uom), Some(38));
        assert_eq!(mmr.readings[0].value, 1500);
    }
}
