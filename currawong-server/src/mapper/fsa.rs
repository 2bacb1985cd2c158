use crate::mrid;
use crate::sep2::fsa::{FunctionSetAssignments, FunctionSetAssignmentsList};
use crate::sep2::{sep2_ns, ListLink};

use super::{MapperContext, PUBLIC_FSA_ID};

/// Every site carries one static function-set assignment pointing at its DER
/// programs and tariff profiles.
pub fn map_fsa(ctx: &MapperContext, site_id: i64, tariff_count: i64) -> FunctionSetAssignments {
    FunctionSetAssignments {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/fsa/{PUBLIC_FSA_ID}")),
        mrid: mrid::encode_function_set_assignment_mrid(ctx.iana_pen, site_id, PUBLIC_FSA_ID),
        description: Some(String::from("FSA")),
        der_program_list_link: Some(ListLink::new(ctx.href(&format!("/edev/{site_id}/derp")), None)),
        tariff_profile_list_link: Some(ListLink::new(
            ctx.href(&format!("/edev/{site_id}/tp")),
            Some(tariff_count),
        )),
    }
}

pub fn map_fsa_list(
    ctx: &MapperContext,
    site_id: i64,
    tariff_count: i64,
    poll_rate: Option<i32>,
) -> FunctionSetAssignmentsList {
    FunctionSetAssignmentsList {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/fsa")),
        all: 1,
        results: 1,
        poll_rate,
        function_set_assignments: vec![map_fsa(ctx, site_id, tariff_count)],
    }
}
