use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rand::Rng as _;
use time::OffsetDateTime;

use crate::auth;
use crate::http::{CreatedAt, HttpError, Sep2Xml, ServiceError};
use crate::mapper::{end_device as edev_mapper, MapperContext};
use crate::model::site::DeviceCategory;
use crate::model::SubscriptionResource;
use crate::scope::{CertificateType, DeviceOrAggregatorScope, SiteScope, UnregisteredScope};
use crate::sep2::end_device::{EndDevice, EndDeviceList, Registration};
use crate::store;
use crate::store::site::SiteRegistration;
use crate::ServerState;

use super::{mapper_context, ListQuery};

const DEFAULT_TIMEZONE: &str = "Australia/Brisbane";

pub async fn get_end_device_list(
    State(state): State<ServerState>,
    scope: UnregisteredScope,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<EndDeviceList>, HttpError> {
    let params = query.params();
    let ctx = mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    let runtime_config = store::runtime_config::fetch_runtime_config(&state.pool).await;

    // A device cert only ever sees its own site.
    let (sites, total) = match scope.source {
        CertificateType::AggregatorCert => {
            let sites = store::site::select_sites_for_aggregator(&state.pool, scope.aggregator_id, params)
                .await
                .map_err(HttpError::internal().err())?;
            let total = store::site::select_aggregator_site_count(&state.pool, scope.aggregator_id, params.after)
                .await
                .map_err(HttpError::internal().err())?;
            (sites, total)
        }
        CertificateType::DeviceCert => {
            let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
            let site = match scope.registered_site_id {
                Some(site_id) => store::site::select_site_by_id(&mut conn, scope.aggregator_id, site_id)
                    .await
                    .map_err(HttpError::internal().err())?,
                None => None,
            };
            let sites: Vec<_> = site.into_iter().collect();
            let total = i64::try_from(sites.len()).unwrap_or(0);
            (sites, total)
        }
    };

    Ok(Sep2Xml(edev_mapper::map_site_list(
        &ctx,
        &sites,
        total,
        Some(runtime_config.edevl_pollrate_seconds),
    )))
}

fn validate_registration(
    scope: &UnregisteredScope,
    request: &EndDevice,
) -> Result<(String, i64), ServiceError> {
    let body_lfdi = request
        .lfdi
        .as_deref()
        .map(str::to_lowercase)
        .filter(|lfdi| !lfdi.is_empty());

    let lfdi = match scope.source {
        CertificateType::DeviceCert => {
            // A device may only ever register itself.
            match body_lfdi {
                Some(lfdi) if lfdi == scope.lfdi.to_lowercase() => lfdi,
                _ => {
                    return Err(ServiceError::forbidden(
                        "EndDevice lFDI must match the client certificate",
                    ))
                }
            }
        }
        CertificateType::AggregatorCert => body_lfdi.ok_or_else(|| {
            ServiceError::bad_request("EndDevice lFDI is required")
        })?,
    };

    let sfdi = if request.sfdi != 0 {
        request.sfdi
    } else {
        i64::try_from(auth::sfdi_from_lfdi(&lfdi).map_err(|e| ServiceError::bad_request(e.to_string()))?)
            .map_err(|_| ServiceError::bad_request("sFDI out of range"))?
    };

    Ok((lfdi, sfdi))
}

/// EndDevice registration. Idempotent per (aggregator, LFDI); collisions
/// across aggregators conflict.
pub async fn create_end_device(
    State(state): State<ServerState>,
    scope: UnregisteredScope,
    Sep2Xml(request): Sep2Xml<EndDevice>,
) -> Result<impl IntoResponse, HttpError> {
    let (lfdi, sfdi) = validate_registration(&scope, &request)?;

    let device_category = request
        .device_category
        .as_deref()
        .map(|hex_str| {
            DeviceCategory::from_hex(hex_str)
                .ok_or_else(|| ServiceError::bad_request("deviceCategory is not a hex bitmask"))
        })
        .transpose()?
        .unwrap_or(DeviceCategory::empty());

    let changed_time = OffsetDateTime::now_utc();
    let registration = SiteRegistration {
        aggregator_id: scope.aggregator_id,
        lfdi,
        sfdi,
        device_category: i64::from(device_category.bits()),
        timezone_id: String::from(DEFAULT_TIMEZONE),
        registration_pin: rand::thread_rng().gen_range(0..=99_999),
        changed_time,
    };

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    let outcome = store::site::upsert_site(&mut tx, &registration).await?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    state
        .notifications
        .notify_changed(SubscriptionResource::Site, changed_time)
        .await;

    let location = crate::http::generate_href(
        scope.href_prefix.as_deref(),
        &format!("/edev/{}", outcome.site_id),
    );

    Ok(CreatedAt(location))
}

pub async fn get_end_device(
    State(state): State<ServerState>,
    scope: DeviceOrAggregatorScope,
) -> Result<Sep2Xml<EndDevice>, HttpError> {
    // The virtual end-device has no concrete row to serve.
    let site_id = scope
        .site_id
        .ok_or_else(|| HttpError::not_found().msg("no such end device"))?;

    let ctx = mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let site = store::site::select_site_by_id(&mut conn, scope.aggregator_id, site_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such end device"))?;

    Ok(Sep2Xml(edev_mapper::map_site(&ctx, &site)))
}

/// Transactional cascade delete; every removed row lands in the archive
/// with the same `deleted_time`, and per-resource notifications fire after
/// commit.
pub async fn delete_end_device(
    State(state): State<ServerState>,
    scope: SiteScope,
) -> Result<StatusCode, HttpError> {
    let deleted_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    let removed = store::site::delete_site(&mut tx, scope.aggregator_id, scope.site_id, deleted_time).await?;
    if !removed {
        return Err(HttpError::not_found().msg("no such end device"));
    }
    tx.commit().await.map_err(HttpError::internal().err())?;

    for resource in [
        SubscriptionResource::Site,
        SubscriptionResource::DynamicOperatingEnvelope,
        SubscriptionResource::TariffGeneratedRate,
        SubscriptionResource::Reading,
    ] {
        state.notifications.notify_changed(resource, deleted_time).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_registration(
    State(state): State<ServerState>,
    scope: SiteScope,
) -> Result<Sep2Xml<Registration>, HttpError> {
    let ctx = MapperContext {
        href_prefix: scope.href_prefix.clone(),
        iana_pen: scope.iana_pen,
        pow10: 0,
    };

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let site = store::site::select_site_by_id(&mut conn, scope.aggregator_id, scope.site_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such end device"))?;

    Ok(Sep2Xml(edev_mapper::map_registration(&ctx, &site)))
}
