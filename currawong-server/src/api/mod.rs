pub mod cp;
pub mod dcap;
pub mod der;
pub mod derp;
pub mod edev;
pub mod fsa;
pub mod log;
pub mod mup;
pub mod rsps;
pub mod sub;
pub mod tm;
pub mod tp;

use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::mapper::MapperContext;
use crate::store::ListParams;
use crate::{ServerState, MAX_LIST_LIMIT};

/// sep2 list query parameters: `s` skip, `a` changed-after (epoch seconds),
/// `l` limit.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListQuery {
    pub s: Option<i64>,
    pub a: Option<i64>,
    pub l: Option<i64>,
}

impl ListQuery {
    pub fn params(self) -> ListParams {
        ListParams {
            start: self.s.unwrap_or(0).max(0),
            limit: self.l.unwrap_or(1).clamp(0, MAX_LIST_LIMIT),
            after: self
                .a
                .and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch).ok())
                .unwrap_or(OffsetDateTime::UNIX_EPOCH),
        }
    }
}

/// Builds the mapper context for a request from its scope material plus the
/// runtime-configured power-of-ten encoding.
pub async fn mapper_context(
    state: &ServerState,
    href_prefix: Option<String>,
    iana_pen: u32,
) -> MapperContext {
    let runtime_config = crate::store::runtime_config::fetch_runtime_config(&state.pool).await;
    #[allow(clippy::cast_possible_truncation)]
    MapperContext {
        href_prefix,
        iana_pen,
        pow10: runtime_config.site_control_pow10_encoding as i16,
    }
}

pub fn make_router(state: ServerState) -> Router {
    let mut router = Router::new()
        .route("/dcap", get(dcap::get_device_capability))
        .route("/tm", get(tm::get_time))
        .route("/edev", get(edev::get_end_device_list).post(edev::create_end_device))
        .route(
            "/edev/{site_id}",
            get(edev::get_end_device).delete(edev::delete_end_device),
        )
        .route("/edev/{site_id}/reg", get(edev::get_registration))
        .route(
            "/edev/{site_id}/cp",
            get(cp::get_connection_point)
                .post(cp::put_connection_point)
                .put(cp::put_connection_point),
        )
        .route("/edev/{site_id}/der", get(der::get_der_list))
        .route("/edev/{site_id}/der/{der_id}", get(der::get_der))
        .route(
            "/edev/{site_id}/der/{der_id}/derc",
            get(der::get_capability).put(der::put_capability),
        )
        .route(
            "/edev/{site_id}/der/{der_id}/ders",
            get(der::get_settings).put(der::put_settings),
        )
        .route(
            "/edev/{site_id}/der/{der_id}/dera",
            get(der::get_availability).put(der::put_availability),
        )
        .route(
            "/edev/{site_id}/der/{der_id}/dstat",
            get(der::get_status).put(der::put_status),
        )
        .route("/edev/{site_id}/derp", get(derp::get_program_list))
        .route("/edev/{site_id}/derp/{derp_id}", get(derp::get_program))
        .route("/edev/{site_id}/derp/{derp_id}/derc", get(derp::get_controls))
        .route(
            "/edev/{site_id}/derp/{derp_id}/derc/active",
            get(derp::get_active_controls),
        )
        .route("/edev/{site_id}/derp/{derp_id}/dderc", get(derp::get_default_control))
        .route("/edev/{site_id}/fsa", get(fsa::get_fsa_list))
        .route("/edev/{site_id}/fsa/{fsa_id}", get(fsa::get_fsa))
        .route("/edev/{site_id}/sub", get(sub::get_subscription_list).post(sub::create_subscription))
        .route(
            "/edev/{site_id}/sub/{sub_id}",
            get(sub::get_subscription).delete(sub::delete_subscription),
        )
        .route("/edev/{site_id}/log", get(log::get_log_event_list).post(log::create_log_event))
        .route("/edev/{site_id}/log/{log_id}", get(log::get_log_event))
        .route("/edev/{site_id}/rsps", get(rsps::get_response_set_list))
        .route("/edev/{site_id}/rsps/{list}", get(rsps::get_response_set))
        .route(
            "/edev/{site_id}/rsps/{list}/rsp",
            get(rsps::get_response_list).post(rsps::create_response),
        )
        .route("/edev/{site_id}/rsps/{list}/rsp/{rsp_id}", get(rsps::get_response))
        .route("/edev/{site_id}/tp", get(tp::get_tariff_profile_list))
        .route("/edev/{site_id}/tp/{tariff_id}", get(tp::get_tariff_profile))
        .route("/edev/{site_id}/tp/{tariff_id}/rc", get(tp::get_rate_component_list))
        .route(
            "/edev/{site_id}/tp/{tariff_id}/rc/{reading}/tti",
            get(tp::get_time_tariff_interval_list),
        )
        .route("/mup", get(mup::get_mup_list).post(mup::create_mup))
        .route(
            "/mup/{mup_id}",
            get(mup::get_mup).post(mup::post_readings).delete(mup::delete_mup),
        );

    if state.conf_handle.get_conf().install_csip_v11a_opt_in_middleware {
        router = router.layer(axum::middleware::from_fn(crate::middleware::csip_v11a_opt_in));
    }

    router
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::lfdi_auth,
        ))
        .with_state(state)
}

/// Unsecured version probe, mounted outside the certificate middleware.
pub fn make_unsecured_router() -> Router<ServerState> {
    Router::new().route("/version", get(version_handler))
}

async fn version_handler() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
