use rust_decimal::Decimal;

use crate::model::{Tariff, TariffGeneratedRate};
use crate::mrid::{self, PricingReadingType};
use crate::sep2::pricing::{
    RateComponent, RateComponentList, TariffProfile, TariffProfileList, TimeTariffInterval,
    TimeTariffIntervalList,
};
use crate::sep2::{sep2_ns, DateTimeInterval, ListLink};

use super::MapperContext;

/// URI slug per pricing reading flavour.
pub fn reading_slug(reading: PricingReadingType) -> &'static str {
    match reading {
        PricingReadingType::ImportActivePowerKwh => "iaw",
        PricingReadingType::ExportActivePowerKwh => "eaw",
        PricingReadingType::ImportReactivePowerKvarh => "irv",
        PricingReadingType::ExportReactivePowerKvarh => "erv",
    }
}

pub fn reading_from_slug(slug: &str) -> Option<PricingReadingType> {
    match slug {
        "iaw" => Some(PricingReadingType::ImportActivePowerKwh),
        "eaw" => Some(PricingReadingType::ExportActivePowerKwh),
        "irv" => Some(PricingReadingType::ImportReactivePowerKvarh),
        "erv" => Some(PricingReadingType::ExportReactivePowerKvarh),
        _ => None,
    }
}

pub fn map_tariff_profile(ctx: &MapperContext, site_id: i64, tariff: &Tariff) -> TariffProfile {
    let tariff_id = tariff.tariff_id;
    TariffProfile {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/tp/{tariff_id}")),
        mrid: mrid::encode_tariff_mrid(ctx.iana_pen, tariff_id),
        currency: tariff.currency_code,
        price_power_of_ten_multiplier: PRICE_POW10,
        rate_code: Some(tariff.dnsp_code.clone()),
        rate_component_list_link: Some(ListLink::new(
            ctx.href(&format!("/edev/{site_id}/tp/{tariff_id}/rc")),
            Some(i64::try_from(PricingReadingType::ALL.len()).unwrap_or(4)),
        )),
    }
}

pub fn map_tariff_profile_list(
    ctx: &MapperContext,
    site_id: i64,
    tariffs: &[Tariff],
    total: i64,
) -> TariffProfileList {
    TariffProfileList {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/tp")),
        all: total,
        results: i64::try_from(tariffs.len()).unwrap_or(i64::MAX),
        tariff_profiles: tariffs
            .iter()
            .map(|tariff| map_tariff_profile(ctx, site_id, tariff))
            .collect(),
    }
}

pub fn map_rate_component(
    ctx: &MapperContext,
    site_id: i64,
    tariff_id: i64,
    reading: PricingReadingType,
    rate_count: i64,
) -> RateComponent {
    let slug = reading_slug(reading);
    RateComponent {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/tp/{tariff_id}/rc/{slug}")),
        mrid: mrid::encode_rate_component_mrid(ctx.iana_pen, tariff_id, site_id, reading),
        description: Some(format!("{reading:?}")),
        time_tariff_interval_list_link: Some(ListLink::new(
            ctx.href(&format!("/edev/{site_id}/tp/{tariff_id}/rc/{slug}/tti")),
            Some(rate_count),
        )),
    }
}

pub fn map_rate_component_list(
    ctx: &MapperContext,
    site_id: i64,
    tariff_id: i64,
    rate_count: i64,
) -> RateComponentList {
    let rate_components: Vec<RateComponent> = PricingReadingType::ALL
        .iter()
        .map(|reading| map_rate_component(ctx, site_id, tariff_id, *reading, rate_count))
        .collect();

    RateComponentList {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/tp/{tariff_id}/rc")),
        all: i64::try_from(rate_components.len()).unwrap_or(i64::MAX),
        results: i64::try_from(rate_components.len()).unwrap_or(i64::MAX),
        rate_components,
    }
}

/// Price is encoded in 10^-4 dollars (hundredths of a cent) per kWh/kvarh.
pub const PRICE_POW10: i16 = -4;

fn rate_price(rate: &TariffGeneratedRate, reading: PricingReadingType) -> Decimal {
    match reading {
        PricingReadingType::ImportActivePowerKwh => rate.import_active_price,
        PricingReadingType::ExportActivePowerKwh => rate.export_active_price,
        PricingReadingType::ImportReactivePowerKvarh => rate.import_reactive_price,
        PricingReadingType::ExportReactivePowerKvarh => rate.export_reactive_price,
    }
}

/// One TimeTariffInterval per pricing reading flavour; the mRID embeds the
/// `(rate_id, flavour)` pair so responses can be correlated back.
pub fn map_rate(
    ctx: &MapperContext,
    rate: &TariffGeneratedRate,
    reading: PricingReadingType,
) -> TimeTariffInterval {
    let scale = Decimal::from(10i64.pow(u32::from(PRICE_POW10.unsigned_abs())));
    let price: i64 = (rate_price(rate, reading) * scale).trunc().try_into().unwrap_or(0);

    TimeTariffInterval {
        xmlns: sep2_ns(),
        href: None,
        mrid: mrid::encode_time_tariff_interval_mrid(ctx.iana_pen, rate.tariff_generated_rate_id, reading),
        creation_time: rate.created_time.unix_timestamp(),
        interval: DateTimeInterval {
            start: rate.start_time.unix_timestamp(),
            duration: i64::from(rate.duration_seconds),
        },
        tou_tier: 0,
        price,
        price_power_of_ten_multiplier: PRICE_POW10,
    }
}

pub fn map_rate_all_readings(ctx: &MapperContext, rate: &TariffGeneratedRate) -> Vec<TimeTariffInterval> {
    PricingReadingType::ALL
        .iter()
        .map(|reading| map_rate(ctx, rate, *reading))
        .collect()
}

pub fn map_rate_list(
    ctx: &MapperContext,
    href: String,
    intervals: Vec<TimeTariffInterval>,
    total: i64,
) -> TimeTariffIntervalList {
    TimeTariffIntervalList {
        xmlns: sep2_ns(),
        href,
        all: total,
        results: i64::try_from(intervals.len()).unwrap_or(i64::MAX),
        time_tariff_intervals: intervals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::datetime;

    #[test]
    fn price_scales_to_ten_thousandths() {
        let start = datetime!(2024-01-01 00:00 +10);
        let rate = TariffGeneratedRate {
            tariff_generated_rate_id: 9,
            tariff_id: 2,
            site_id: 3,
            calculation_log_id: None,
            start_time: start,
            duration_seconds: 300,
            import_active_price: Decimal::new(11_567, 4), // $1.1567
            export_active_price: Decimal::new(-500, 4),
            import_reactive_price: Decimal::ZERO,
            export_reactive_price: Decimal::ZERO,
            created_time: start,
            changed_time: start,
        };

        let ctx = MapperContext {
            href_prefix: None,
            iana_pen: 40414,
            pow10: -2,
        };

        let import = map_rate(&ctx, &rate, PricingReadingType::ImportActivePowerKwh);
        assert_eq!(import.price, 11_567);
        assert_eq!(import.price_power_of_ten_multiplier, PRICE_POW10);

        let export = map_rate(&ctx, &rate, PricingReadingType::ExportActivePowerKwh);
        assert_eq!(export.price, -500);

        assert_eq!(
            mrid::decode_time_tariff_interval_mrid(&import.mrid),
            Ok((9, PricingReadingType::ImportActivePowerKwh))
        );
    }
}
