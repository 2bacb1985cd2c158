//! DER facet handlers. A missing facet row is served as a synthetic default
//! rather than a 404; PUTs replace the facet wholesale.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use time::OffsetDateTime;

use crate::http::{HttpError, Sep2Xml};
use crate::mapper::{der as der_mapper, MapperContext, PUBLIC_SITE_DER_ID};
use crate::model::der::{SiteDerAvailability, SiteDerRating, SiteDerSetting, SiteDerStatus};
use crate::scope::SiteScope;
use crate::sep2::der::{Der, DerAvailability, DerCapability, DerList, DerSettings, DerStatus};
use crate::store;
use crate::ServerState;

fn check_der_id(der_id: i64) -> Result<(), HttpError> {
    if der_id == PUBLIC_SITE_DER_ID {
        Ok(())
    } else {
        Err(HttpError::not_found().msg("no such DER"))
    }
}

async fn ctx_for(state: &ServerState, scope: &SiteScope) -> MapperContext {
    super::mapper_context(state, scope.href_prefix.clone(), scope.iana_pen).await
}

async fn ensure_site_in_scope(state: &ServerState, scope: &SiteScope) -> Result<(), HttpError> {
    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    store::site::select_site_by_id(&mut conn, scope.aggregator_id, scope.site_id)
        .await
        .map_err(HttpError::internal().err())?
        .map(|_| ())
        .ok_or_else(|| HttpError::not_found().msg("no such end device"))
}

pub async fn get_der_list(
    State(state): State<ServerState>,
    scope: SiteScope,
) -> Result<Sep2Xml<DerList>, HttpError> {
    ensure_site_in_scope(&state, &scope).await?;
    let runtime_config = store::runtime_config::fetch_runtime_config(&state.pool).await;
    let ctx = ctx_for(&state, &scope).await;
    Ok(Sep2Xml(der_mapper::map_der_list(
        &ctx,
        scope.site_id,
        Some(runtime_config.derl_pollrate_seconds),
    )))
}

pub async fn get_der(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, der_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<Der>, HttpError> {
    check_der_id(der_id)?;
    ensure_site_in_scope(&state, &scope).await?;
    let ctx = ctx_for(&state, &scope).await;
    Ok(Sep2Xml(der_mapper::map_der(&ctx, scope.site_id)))
}

pub async fn get_capability(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, der_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<DerCapability>, HttpError> {
    check_der_id(der_id)?;
    ensure_site_in_scope(&state, &scope).await?;
    let ctx = ctx_for(&state, &scope).await;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let rating = match store::der::select_site_der(&mut conn, scope.site_id)
        .await
        .map_err(HttpError::internal().err())?
    {
        Some(der) => store::der::select_der_rating(&mut conn, der.site_der_id)
            .await
            .map_err(HttpError::internal().err())?,
        None => None,
    };

    Ok(Sep2Xml(der_mapper::map_capability(&ctx, scope.site_id, rating.as_ref())))
}

pub async fn put_capability(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, der_id)): Path<(i64, i64)>,
    Sep2Xml(request): Sep2Xml<DerCapability>,
) -> Result<StatusCode, HttpError> {
    check_der_id(der_id)?;
    ensure_site_in_scope(&state, &scope).await?;
    let changed_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    let der = store::der::ensure_site_der(&mut tx, scope.site_id, changed_time)
        .await
        .map_err(HttpError::internal().err())?;

    let row = SiteDerRating {
        site_der_rating_id: 0,
        site_der_id: der.site_der_id,
        modes_supported: request
            .modes_supported
            .as_deref()
            .and_then(|hex_str| i64::from_str_radix(hex_str, 16).ok()),
        der_type: request.der_type.unwrap_or(0),
        max_w_value: request.rtg_max_w.map(|p| i32::try_from(p.value).unwrap_or(0)).unwrap_or(0),
        max_w_multiplier: request.rtg_max_w.map(|p| p.multiplier).unwrap_or(0),
        max_va_value: request.rtg_max_va.map(|p| i32::try_from(p.value).unwrap_or(0)),
        max_va_multiplier: request.rtg_max_va.map(|p| p.multiplier),
        max_var_value: request.rtg_max_var.map(|p| i32::try_from(p.value).unwrap_or(0)),
        max_var_multiplier: request.rtg_max_var.map(|p| p.multiplier),
        v_nom_value: request.rtg_v_nom.map(|p| i32::try_from(p.value).unwrap_or(0)),
        v_nom_multiplier: request.rtg_v_nom.map(|p| p.multiplier),
        changed_time,
    };
    store::der::upsert_der_rating(&mut tx, &row).await.map_err(HttpError::internal().err())?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_settings(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, der_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<DerSettings>, HttpError> {
    check_der_id(der_id)?;
    ensure_site_in_scope(&state, &scope).await?;
    let ctx = ctx_for(&state, &scope).await;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let setting = match store::der::select_site_der(&mut conn, scope.site_id)
        .await
        .map_err(HttpError::internal().err())?
    {
        Some(der) => store::der::select_der_setting(&mut conn, der.site_der_id)
            .await
            .map_err(HttpError::internal().err())?,
        None => None,
    };

    Ok(Sep2Xml(der_mapper::map_settings(&ctx, scope.site_id, setting.as_ref())))
}

pub async fn put_settings(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, der_id)): Path<(i64, i64)>,
    Sep2Xml(request): Sep2Xml<DerSettings>,
) -> Result<StatusCode, HttpError> {
    check_der_id(der_id)?;
    ensure_site_in_scope(&state, &scope).await?;
    let changed_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    let der = store::der::ensure_site_der(&mut tx, scope.site_id, changed_time)
        .await
        .map_err(HttpError::internal().err())?;

    let row = SiteDerSetting {
        site_der_setting_id: 0,
        site_der_id: der.site_der_id,
        modes_enabled: request
            .modes_enabled
            .as_deref()
            .and_then(|hex_str| i64::from_str_radix(hex_str, 16).ok()),
        max_w_value: request.set_max_w.map(|p| i32::try_from(p.value).unwrap_or(0)).unwrap_or(0),
        max_w_multiplier: request.set_max_w.map(|p| p.multiplier).unwrap_or(0),
        max_va_value: request.set_max_va.map(|p| i32::try_from(p.value).unwrap_or(0)),
        max_va_multiplier: request.set_max_va.map(|p| p.multiplier),
        max_var_value: request.set_max_var.map(|p| i32::try_from(p.value).unwrap_or(0)),
        max_var_multiplier: request.set_max_var.map(|p| p.multiplier),
        grad_w: request.set_grad_w,
        changed_time,
    };
    store::der::upsert_der_setting(&mut tx, &row).await.map_err(HttpError::internal().err())?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_availability(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, der_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<DerAvailability>, HttpError> {
    check_der_id(der_id)?;
    ensure_site_in_scope(&state, &scope).await?;
    let ctx = ctx_for(&state, &scope).await;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let availability = match store::der::select_site_der(&mut conn, scope.site_id)
        .await
        .map_err(HttpError::internal().err())?
    {
        Some(der) => store::der::select_der_availability(&mut conn, der.site_der_id)
            .await
            .map_err(HttpError::internal().err())?,
        None => None,
    };

    Ok(Sep2Xml(der_mapper::map_availability(&ctx, scope.site_id, availability.as_ref())))
}

pub async fn put_availability(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, der_id)): Path<(i64, i64)>,
    Sep2Xml(request): Sep2Xml<DerAvailability>,
) -> Result<StatusCode, HttpError> {
    check_der_id(der_id)?;
    ensure_site_in_scope(&state, &scope).await?;
    let changed_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    let der = store::der::ensure_site_der(&mut tx, scope.site_id, changed_time)
        .await
        .map_err(HttpError::internal().err())?;

    let row = SiteDerAvailability {
        site_der_availability_id: 0,
        site_der_id: der.site_der_id,
        availability_duration_sec: request.availability_duration,
        max_charge_duration_sec: request.max_charge_duration,
        reserved_charge_percent: request.reserve_charge_percent,
        reserved_deliver_percent: request.reserve_percent,
        estimated_w_avail_value: request.stat_w_avail.map(|p| i32::try_from(p.value).unwrap_or(0)),
        estimated_w_avail_multiplier: request.stat_w_avail.map(|p| p.multiplier),
        changed_time,
    };
    store::der::upsert_der_availability(&mut tx, &row)
        .await
        .map_err(HttpError::internal().err())?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_status(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, der_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<DerStatus>, HttpError> {
    check_der_id(der_id)?;
    ensure_site_in_scope(&state, &scope).await?;
    let ctx = ctx_for(&state, &scope).await;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let status = match store::der::select_site_der(&mut conn, scope.site_id)
        .await
        .map_err(HttpError::internal().err())?
    {
        Some(der) => store::der::select_der_status(&mut conn, der.site_der_id)
            .await
            .map_err(HttpError::internal().err())?,
        None => None,
    };

    Ok(Sep2Xml(der_mapper::map_status(&ctx, scope.site_id, status.as_ref())))
}

pub async fn put_status(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, der_id)): Path<(i64, i64)>,
    Sep2Xml(request): Sep2Xml<DerStatus>,
) -> Result<StatusCode, HttpError> {
    check_der_id(der_id)?;
    ensure_site_in_scope(&state, &scope).await?;
    let changed_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    let der = store::der::ensure_site_der(&mut tx, scope.site_id, changed_time)
        .await
        .map_err(HttpError::internal().err())?;

    let row = SiteDerStatus {
        site_der_status_id: 0,
        site_der_id: der.site_der_id,
        operational_mode_status: request.operational_mode_status.map(|v| v.value),
        generator_connect_status: request.gen_connect_status.map(|v| v.value),
        inverter_status: request.inverter_status.map(|v| v.value),
        alarm_status: None,
        state_of_charge_status: request.state_of_charge_status.map(|v| v.value),
        changed_time,
    };
    store::der::upsert_der_status(&mut tx, &row).await.map_err(HttpError::internal().err())?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    Ok(StatusCode::NO_CONTENT)
}
