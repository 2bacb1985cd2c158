use time::OffsetDateTime;

use crate::config::DefaultDoeConfiguration;
use crate::model::{DynamicOperatingEnvelope, SiteControlGroup};
use crate::mrid;
use crate::sep2::derp::{
    DefaultDerControl, DerControl, DerControlBase, DerControlList, DerProgram, DerProgramList, EventStatus,
};
use crate::sep2::{sep2_ns, ActivePower, DateTimeInterval, Link, ListLink};

use super::MapperContext;

/// sep2 EventStatus currentStatus values relevant to DOEs.
const EVENT_STATUS_SCHEDULED: i32 = 0;
const EVENT_STATUS_ACTIVE: i32 = 1;
const EVENT_STATUS_CANCELLED: i32 = 2;
const EVENT_STATUS_SUPERSEDED: i32 = 5;

fn limit_to_power(limit: Option<rust_decimal::Decimal>, pow10: i16) -> Option<ActivePower> {
    limit.map(|watts| ActivePower::from_decimal_watts(watts, pow10))
}

pub fn map_control_base(
    pow10: i16,
    import: Option<rust_decimal::Decimal>,
    export: Option<rust_decimal::Decimal>,
    generation: Option<rust_decimal::Decimal>,
    load: Option<rust_decimal::Decimal>,
    set_energized: Option<bool>,
    ramp_rate: Option<i16>,
) -> DerControlBase {
    DerControlBase {
        op_mod_imp_lim_w: limit_to_power(import, pow10),
        op_mod_exp_lim_w: limit_to_power(export, pow10),
        op_mod_gen_lim_w: limit_to_power(generation, pow10),
        op_mod_load_lim_w: limit_to_power(load, pow10),
        op_mod_energize: set_energized,
        ramp_tms: ramp_rate.map(i32::from),
    }
}

pub fn map_program(
    ctx: &MapperContext,
    site_id: i64,
    group: &SiteControlGroup,
    control_count: Option<i64>,
) -> DerProgram {
    let derp_id = group.site_control_group_id;
    DerProgram {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/derp/{derp_id}")),
        mrid: mrid::encode_der_program_mrid(ctx.iana_pen, site_id),
        description: Some(group.description.clone()),
        primacy: group.primacy,
        der_control_list_link: Some(ListLink::new(
            ctx.href(&format!("/edev/{site_id}/derp/{derp_id}/derc")),
            control_count,
        )),
        active_der_control_list_link: Some(ListLink::new(
            ctx.href(&format!("/edev/{site_id}/derp/{derp_id}/derc/active")),
            None,
        )),
        default_der_control_link: Some(Link::new(
            ctx.href(&format!("/edev/{site_id}/derp/{derp_id}/dderc")),
        )),
    }
}

pub fn map_program_list(
    ctx: &MapperContext,
    site_id: i64,
    groups: &[SiteControlGroup],
    total: i64,
    poll_rate: Option<i32>,
) -> DerProgramList {
    DerProgramList {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/derp")),
        all: total,
        results: i64::try_from(groups.len()).unwrap_or(i64::MAX),
        poll_rate,
        der_programs: groups
            .iter()
            .map(|group| map_program(ctx, site_id, group, None))
            .collect(),
    }
}

fn doe_event_status(doe: &DynamicOperatingEnvelope, now: OffsetDateTime, deleted: bool) -> EventStatus {
    let current_status = if deleted {
        EVENT_STATUS_CANCELLED
    } else if doe.superseded {
        EVENT_STATUS_SUPERSEDED
    } else if doe.is_active_at(now) {
        EVENT_STATUS_ACTIVE
    } else {
        EVENT_STATUS_SCHEDULED
    };

    EventStatus {
        current_status,
        date_time: now.unix_timestamp(),
        potentially_superseded: doe.superseded,
    }
}

pub fn map_doe(
    ctx: &MapperContext,
    site_id: i64,
    derp_id: i64,
    doe: &DynamicOperatingEnvelope,
    now: OffsetDateTime,
    deleted: bool,
) -> DerControl {
    DerControl {
        xmlns: sep2_ns(),
        href: Some(ctx.href(&format!(
            "/edev/{site_id}/derp/{derp_id}/derc/{}",
            doe.dynamic_operating_envelope_id
        ))),
        mrid: mrid::encode_doe_mrid(ctx.iana_pen, doe.dynamic_operating_envelope_id),
        creation_time: doe.created_time.unix_timestamp(),
        event_status: Some(doe_event_status(doe, now, deleted)),
        interval: DateTimeInterval {
            start: doe.start_time.unix_timestamp(),
            duration: i64::from(doe.duration_seconds),
        },
        der_control_base: map_control_base(
            ctx.pow10,
            doe.import_limit_active_watts,
            doe.export_limit_active_watts,
            doe.generation_limit_active_watts,
            doe.load_limit_active_watts,
            doe.set_energized,
            doe.ramp_rate_percent_per_second,
        ),
    }
}

pub fn map_doe_list(
    ctx: &MapperContext,
    site_id: i64,
    derp_id: i64,
    does: &[(DynamicOperatingEnvelope, bool)],
    total: i64,
    now: OffsetDateTime,
) -> DerControlList {
    DerControlList {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/derp/{derp_id}/derc")),
        all: total,
        results: i64::try_from(does.len()).unwrap_or(i64::MAX),
        der_controls: does
            .iter()
            .map(|(doe, deleted)| map_doe(ctx, site_id, derp_id, doe, now, *deleted))
            .collect(),
    }
}

pub fn map_default_control(
    ctx: &MapperContext,
    site_id: i64,
    derp_id: i64,
    defaults: &DefaultDoeConfiguration,
) -> DefaultDerControl {
    DefaultDerControl {
        xmlns: sep2_ns(),
        href: Some(ctx.href(&format!("/edev/{site_id}/derp/{derp_id}/dderc"))),
        mrid: mrid::encode_default_doe_mrid(ctx.iana_pen, site_id),
        set_grad_w: None,
        der_control_base: map_control_base(
            ctx.pow10,
            defaults.import_limit_active_watts,
            defaults.export_limit_active_watts,
            defaults.generation_limit_active_watts,
            defaults.load_limit_active_watts,
            None,
            defaults.ramp_rate_percent_per_second,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rust_decimal::Decimal;
    use time::macros::datetime;

    fn ctx() -> MapperContext {
        MapperContext {
            href_prefix: None,
            iana_pen: 40414,
            pow10: -2,
        }
    }

    fn doe() -> DynamicOperatingEnvelope {
        let start = datetime!(2024-01-01 00:00 +10);
        DynamicOperatingEnvelope {
            dynamic_operating_envelope_id: 42,
            site_id: 3,
            site_control_group_id: 1,
            calculation_log_id: None,
            start_time: start,
            duration_seconds: 300,
            end_time: start + time::Duration::seconds(300),
            import_limit_active_watts: Some(Decimal::new(15005, 1)),
            export_limit_active_watts: Some(Decimal::from(2000)),
            generation_limit_active_watts: None,
            load_limit_active_watts: None,
            set_energized: None,
            ramp_rate_percent_per_second: Some(27),
            superseded: false,
            created_time: start,
            changed_time: start,
        }
    }

    #[test]
    fn doe_maps_with_mrid_and_scaled_limits() {
        let control = map_doe(&ctx(), 3, 1, &doe(), datetime!(2024-01-01 00:01 +10), false);

        assert_eq!(control.mrid, mrid::encode_doe_mrid(40414, 42));
        assert_eq!(control.interval.duration, 300);
        let import = control.der_control_base.op_mod_imp_lim_w.expect("import limit");
        assert_eq!(import.value, 150050);
        assert_eq!(import.multiplier, -2);
        assert_eq!(control.der_control_base.op_mod_gen_lim_w, None);
        assert_eq!(
            control.event_status.expect("status").current_status,
            EVENT_STATUS_ACTIVE
        );
    }

    #[test]
    fn deleted_doe_reads_as_cancelled() {
        let control = map_doe(&ctx(), 3, 1, &doe(), datetime!(2024-01-01 00:01 +10), true);
        assert_eq!(
            control.event_status.expect("status").current_status,
            EVENT_STATUS_CANCELLED
        );
    }
}
