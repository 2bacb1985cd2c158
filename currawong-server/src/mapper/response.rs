use crate::model::{DoeResponse, RateResponse};
use crate::mrid::{self, ResponseSetType};
use crate::sep2::response::{Response, ResponseList, ResponseSet, ResponseSetList};
use crate::sep2::{sep2_ns, ListLink};

use super::MapperContext;

pub fn map_response_set(ctx: &MapperContext, site_id: i64, set_type: ResponseSetType) -> ResponseSet {
    let slug = set_type.slug();
    ResponseSet {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/rsps/{slug}")),
        mrid: mrid::encode_response_set_mrid(ctx.iana_pen, set_type),
        description: Some(match set_type {
            ResponseSetType::TariffGeneratedRates => String::from("Tariff rate responses"),
            ResponseSetType::DynamicOperatingEnvelopes => String::from("Operating envelope responses"),
        }),
        response_list_link: Some(ListLink::new(
            ctx.href(&format!("/edev/{site_id}/rsps/{slug}/rsp")),
            None,
        )),
    }
}

pub fn map_response_set_list(ctx: &MapperContext, site_id: i64, start: i64, limit: i64) -> ResponseSetList {
    let sets: Vec<ResponseSet> = ResponseSetType::ALL
        .iter()
        .skip(usize::try_from(start).unwrap_or(0))
        .take(usize::try_from(limit).unwrap_or(0))
        .map(|set_type| map_response_set(ctx, site_id, *set_type))
        .collect();

    ResponseSetList {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/rsps")),
        all: i64::try_from(ResponseSetType::ALL.len()).unwrap_or(i64::MAX),
        results: i64::try_from(sets.len()).unwrap_or(i64::MAX),
        response_sets: sets,
    }
}

pub fn map_doe_response(ctx: &MapperContext, lfdi: &str, response: &DoeResponse) -> Response {
    Response {
        xmlns: sep2_ns(),
        href: Some(ctx.href(&format!(
            "/edev/{}/rsps/doe/rsp/{}",
            response.site_id, response.doe_response_id
        ))),
        created_date_time: Some(response.created_time.unix_timestamp()),
        end_device_lfdi: lfdi.to_owned(),
        status: Some(response.response_type as i32),
        subject: mrid::encode_doe_mrid(ctx.iana_pen, response.dynamic_operating_envelope_id_snapshot),
    }
}

pub fn map_rate_response(ctx: &MapperContext, lfdi: &str, response: &RateResponse) -> Response {
    Response {
        xmlns: sep2_ns(),
        href: Some(ctx.href(&format!(
            "/edev/{}/rsps/price/rsp/{}",
            response.site_id, response.rate_response_id
        ))),
        created_date_time: Some(response.created_time.unix_timestamp()),
        end_device_lfdi: lfdi.to_owned(),
        status: Some(response.response_type as i32),
        subject: mrid::encode_time_tariff_interval_mrid(
            ctx.iana_pen,
            response.tariff_generated_rate_id_snapshot,
            response.pricing_reading_type,
        ),
    }
}

pub fn map_response_list(
    ctx: &MapperContext,
    site_id: i64,
    set_type: ResponseSetType,
    responses: Vec<Response>,
    total: i64,
) -> ResponseList {
    ResponseList {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/rsps/{}/rsp", set_type.slug())),
        all: total,
        results: i64::try_from(responses.len()).unwrap_or(i64::MAX),
        responses,
    }
}
