use axum::extract::State;

use crate::http::{HttpError, Sep2Xml};
use crate::scope::UnregisteredScope;
use crate::sep2::device_capability::DeviceCapability;
use crate::sep2::{sep2_ns, Link, ListLink};
use crate::store;
use crate::ServerState;

/// `/dcap` advertises the poll rate and the caller's visible resource
/// counts. It's reachable with nothing more than a valid certificate.
pub async fn get_device_capability(
    State(state): State<ServerState>,
    scope: UnregisteredScope,
) -> Result<Sep2Xml<DeviceCapability>, HttpError> {
    let runtime_config = store::runtime_config::fetch_runtime_config(&state.pool).await;

    // A device cert sees exactly its own end-device (when registered).
    let (site_count, mup_count) = match scope.source {
        crate::scope::CertificateType::DeviceCert => {
            let mup_count = match scope.registered_site_id {
                Some(site_id) => store::reading::count_reading_types_for_site(&state.pool, site_id)
                    .await
                    .map_err(HttpError::internal().err())?,
                None => 0,
            };
            (i64::from(scope.registered_site_id.is_some()), mup_count)
        }
        crate::scope::CertificateType::AggregatorCert => {
            let site_count = store::site::select_aggregator_site_count(
                &state.pool,
                scope.aggregator_id,
                time::OffsetDateTime::UNIX_EPOCH,
            )
            .await
            .map_err(HttpError::internal().err())?;

            let mup_count = store::reading::count_reading_types_for_aggregator(
                &state.pool,
                scope.aggregator_id,
                time::OffsetDateTime::UNIX_EPOCH,
            )
            .await
            .map_err(HttpError::internal().err())?;

            (site_count, mup_count)
        }
    };

    let href = |uri: &str| crate::http::generate_href(scope.href_prefix.as_deref(), uri);

    Ok(Sep2Xml(DeviceCapability {
        xmlns: sep2_ns(),
        href: href("/dcap"),
        poll_rate: Some(runtime_config.dcap_pollrate_seconds),
        end_device_list_link: Some(ListLink::new(href("/edev"), Some(site_count))),
        mirror_usage_point_list_link: Some(ListLink::new(href("/mup"), Some(mup_count))),
        time_link: Some(Link::new(href("/tm"))),
    }))
}
