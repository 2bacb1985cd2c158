use crate::model::{SiteReading, SiteReadingType};
use crate::sep2::metering::{
    DateTimeIntervalType, MirrorMeterReading, MirrorUsagePoint, MirrorUsagePointList, Reading, ReadingType,
};
use crate::sep2::sep2_ns;

use super::MapperContext;

pub fn map_reading_type(srt: &SiteReadingType) -> ReadingType {
    ReadingType {
        accumulation_behaviour: Some(srt.accumulation_behaviour),
        commodity: None,
        data_qualifier: Some(srt.data_qualifier),
        flow_direction: Some(srt.flow_direction),
        interval_length: Some(srt.default_interval_seconds),
        kind: Some(srt.kind),
        phase: Some(srt.phase),
        power_of_ten_multiplier: Some(srt.power_of_ten_multiplier),
        uom: Some(srt.uom),
    }
}

pub fn map_reading(reading: &SiteReading) -> Reading {
    Reading {
        local_id: reading.local_id.map(|id| format!("{id:x}")),
        quality_flags: Some(format!("{:x}", reading.quality_flags)),
        time_period: Some(DateTimeIntervalType {
            duration: i64::from(reading.time_period_seconds),
            start: reading.time_period_start.unix_timestamp(),
        }),
        value: reading.value,
    }
}

pub fn map_mirror_usage_point(ctx: &MapperContext, srt: &SiteReadingType) -> MirrorUsagePoint {
    MirrorUsagePoint {
        xmlns: sep2_ns(),
        href: Some(ctx.href(&format!("/mup/{}", srt.site_reading_type_id))),
        mrid: format!("{:032x}", srt.site_reading_type_id),
        description: None,
        device_lfdi: srt.mup_lfdi.clone(),
        post_rate: None,
        role_flags: Some(String::from("3")),
        service_category_kind: Some(0),
        status: Some(0),
        mirror_meter_readings: vec![MirrorMeterReading {
            mrid: format!("{:032x}", srt.site_reading_type_id),
            description: None,
            last_update_time: Some(srt.changed_time.unix_timestamp()),
            reading_type: Some(map_reading_type(srt)),
            readings: Vec::new(),
        }],
    }
}

pub fn map_mirror_usage_point_list(
    ctx: &MapperContext,
    srts: &[SiteReadingType],
    total: i64,
    post_rate: Option<i32>,
) -> MirrorUsagePointList {
    MirrorUsagePointList {
        xmlns: sep2_ns(),
        href: ctx.href("/mup"),
        all: total,
        results: i64::try_from(srts.len()).unwrap_or(i64::MAX),
        poll_rate: post_rate,
        mirror_usage_points: srts.iter().map(|srt| map_mirror_usage_point(ctx, srt)).collect(),
    }
}

/// Flattens a posted MirrorMeterReading's samples into store upserts.
pub fn readings_from_mirror(
    site_reading_type_id: i64,
    mmr: &MirrorMeterReading,
) -> Vec<crate::store::reading::ReadingUpsert> {
    mmr.readings
        .iter()
        .filter_map(|reading| {
            let time_period = reading.time_period?;
            Some(crate::store::reading::ReadingUpsert {
                site_reading_type_id,
                local_id: reading
                    .local_id
                    .as_deref()
                    .and_then(|id| i32::from_str_radix(id, 16).ok()),
                quality_flags: reading
                    .quality_flags
                    .as_deref()
                    .and_then(|flags| i32::from_str_radix(flags, 16).ok())
                    .unwrap_or(0),
                time_period_start: time::OffsetDateTime::from_unix_timestamp(time_period.start).ok()?,
                time_period_seconds: i32::try_from(time_period.duration).unwrap_or(0),
                value: reading.value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::sep2::metering::Reading as WireReading;

    #[test]
    fn readings_flatten_with_hex_fields_decoded() {
        let mmr = MirrorMeterReading {
            mrid: String::from("01"),
            description: None,
            last_update_time: None,
            reading_type: None,
            readings: vec![
                WireReading {
                    local_id: Some(String::from("f")),
                    quality_flags: Some(String::from("1")),
                    time_period: Some(DateTimeIntervalType {
                        duration: 300,
                        start: 1_700_000_000,
                    }),
                    value: 1234,
                },
                // A reading without a time period can't be keyed and is dropped.
                WireReading::default(),
            ],
        };

        let upserts = readings_from_mirror(7, &mmr);
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].site_reading_type_id, 7);
        assert_eq!(upserts[0].local_id, Some(15));
        assert_eq!(upserts[0].quality_flags, 1);
        assert_eq!(upserts[0].value, 1234);
    }
}
