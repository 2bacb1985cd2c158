use crate::model::der::{SiteDerAvailability, SiteDerRating, SiteDerSetting, SiteDerStatus};
use crate::sep2::der::{
    Der, DerAvailability, DerCapability, DerList, DerSettings, DerStatus, ValueWithTime,
};
use crate::sep2::{sep2_ns, ActivePower, Link};

use super::{MapperContext, PUBLIC_SITE_DER_ID};

fn power(value: Option<i32>, multiplier: Option<i16>) -> Option<ActivePower> {
    value.map(|value| ActivePower {
        value: i64::from(value),
        multiplier: multiplier.unwrap_or(0),
    })
}

pub fn map_der(ctx: &MapperContext, site_id: i64) -> Der {
    let der_id = PUBLIC_SITE_DER_ID;
    Der {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/der/{der_id}")),
        der_capability_link: Some(Link::new(ctx.href(&format!("/edev/{site_id}/der/{der_id}/derc")))),
        der_settings_link: Some(Link::new(ctx.href(&format!("/edev/{site_id}/der/{der_id}/ders")))),
        der_availability_link: Some(Link::new(ctx.href(&format!("/edev/{site_id}/der/{der_id}/dera")))),
        der_status_link: Some(Link::new(ctx.href(&format!("/edev/{site_id}/der/{der_id}/dstat")))),
    }
}

pub fn map_der_list(ctx: &MapperContext, site_id: i64, poll_rate: Option<i32>) -> DerList {
    DerList {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/der")),
        all: 1,
        results: 1,
        poll_rate,
        ders: vec![map_der(ctx, site_id)],
    }
}

/// A missing rating row serves as an empty (synthetic) capability.
pub fn map_capability(ctx: &MapperContext, site_id: i64, rating: Option<&SiteDerRating>) -> DerCapability {
    let href = Some(ctx.href(&format!("/edev/{site_id}/der/{PUBLIC_SITE_DER_ID}/derc")));
    match rating {
        None => DerCapability {
            xmlns: sep2_ns(),
            href,
            ..DerCapability::default()
        },
        Some(rating) => DerCapability {
            xmlns: sep2_ns(),
            href,
            modes_supported: rating.modes_supported.map(|m| format!("{m:x}")),
            rtg_max_w: Some(ActivePower {
                value: i64::from(rating.max_w_value),
                multiplier: rating.max_w_multiplier,
            }),
            rtg_max_va: power(rating.max_va_value, rating.max_va_multiplier),
            rtg_max_var: power(rating.max_var_value, rating.max_var_multiplier),
            rtg_v_nom: power(rating.v_nom_value, rating.v_nom_multiplier),
            der_type: Some(rating.der_type),
        },
    }
}

pub fn map_settings(ctx: &MapperContext, site_id: i64, setting: Option<&SiteDerSetting>) -> DerSettings {
    let href = Some(ctx.href(&format!("/edev/{site_id}/der/{PUBLIC_SITE_DER_ID}/ders")));
    match setting {
        None => DerSettings {
            xmlns: sep2_ns(),
            href,
            ..DerSettings::default()
        },
        Some(setting) => DerSettings {
            xmlns: sep2_ns(),
            href,
            modes_enabled: setting.modes_enabled.map(|m| format!("{m:x}")),
            set_grad_w: setting.grad_w,
            set_max_w: Some(ActivePower {
                value: i64::from(setting.max_w_value),
                multiplier: setting.max_w_multiplier,
            }),
            set_max_va: power(setting.max_va_value, setting.max_va_multiplier),
            set_max_var: power(setting.max_var_value, setting.max_var_multiplier),
            updated_time: Some(setting.changed_time.unix_timestamp()),
        },
    }
}

pub fn map_availability(
    ctx: &MapperContext,
    site_id: i64,
    availability: Option<&SiteDerAvailability>,
) -> DerAvailability {
    let href = Some(ctx.href(&format!("/edev/{site_id}/der/{PUBLIC_SITE_DER_ID}/dera")));
    match availability {
        None => DerAvailability {
            xmlns: sep2_ns(),
            href,
            ..DerAvailability::default()
        },
        Some(availability) => DerAvailability {
            xmlns: sep2_ns(),
            href,
            availability_duration: availability.availability_duration_sec,
            max_charge_duration: availability.max_charge_duration_sec,
            reserve_charge_percent: availability.reserved_charge_percent,
            reserve_percent: availability.reserved_deliver_percent,
            stat_w_avail: power(
                availability.estimated_w_avail_value,
                availability.estimated_w_avail_multiplier,
            ),
            reading_time: Some(availability.changed_time.unix_timestamp()),
        },
    }
}

pub fn map_status(ctx: &MapperContext, site_id: i64, status: Option<&SiteDerStatus>) -> DerStatus {
    let href = Some(ctx.href(&format!("/edev/{site_id}/der/{PUBLIC_SITE_DER_ID}/dstat")));
    match status {
        None => DerStatus {
            xmlns: sep2_ns(),
            href,
            ..DerStatus::default()
        },
        Some(status) => {
            let stamp = status.changed_time.unix_timestamp();
            let with_time = |value: Option<i32>| {
                value.map(|value| ValueWithTime {
                    date_time: stamp,
                    value,
                })
            };
            DerStatus {
                xmlns: sep2_ns(),
                href,
                gen_connect_status: with_time(status.generator_connect_status),
                inverter_status: with_time(status.inverter_status),
                operational_mode_status: with_time(status.operational_mode_status),
                state_of_charge_status: with_time(status.state_of_charge_status),
                reading_time: Some(stamp),
            }
        }
    }
}
