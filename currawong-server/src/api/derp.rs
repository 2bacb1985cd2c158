//! DER program handlers: site control groups as programs, DOEs as controls.

use axum::extract::{Path, Query, State};
use time::OffsetDateTime;

use crate::http::{HttpError, Sep2Xml};
use crate::mapper::derp as derp_mapper;
use crate::scope::SiteScope;
use crate::sep2::derp::{DefaultDerControl, DerControlList, DerProgram, DerProgramList};
use crate::store;
use crate::ServerState;

use super::ListQuery;

pub async fn get_program_list(
    State(state): State<ServerState>,
    scope: SiteScope,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<DerProgramList>, HttpError> {
    let params = query.params();
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    let runtime_config = store::runtime_config::fetch_runtime_config(&state.pool).await;

    let groups = store::doe::select_site_control_groups(&state.pool, params)
        .await
        .map_err(HttpError::internal().err())?;
    let total = store::doe::count_site_control_groups(&state.pool, params.after)
        .await
        .map_err(HttpError::internal().err())?;

    Ok(Sep2Xml(derp_mapper::map_program_list(
        &ctx,
        scope.site_id,
        &groups,
        total,
        Some(runtime_config.derpl_pollrate_seconds),
    )))
}

pub async fn get_program(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, derp_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<DerProgram>, HttpError> {
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let group = store::doe::select_site_control_group_by_id(&mut conn, derp_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such DER program"))?;

    let control_count =
        store::doe::count_does_for_site(&state.pool, scope.aggregator_id, scope.site_id, OffsetDateTime::UNIX_EPOCH)
            .await
            .map_err(HttpError::internal().err())?;

    Ok(Sep2Xml(derp_mapper::map_program(
        &ctx,
        scope.site_id,
        &group,
        Some(control_count),
    )))
}

pub async fn get_controls(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, derp_id)): Path<(i64, i64)>,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<DerControlList>, HttpError> {
    let params = query.params();
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let does = store::doe::select_does_for_site(&state.pool, scope.aggregator_id, scope.site_id, params)
        .await
        .map_err(HttpError::internal().err())?;
    let total = store::doe::count_does_for_site(&state.pool, scope.aggregator_id, scope.site_id, params.after)
        .await
        .map_err(HttpError::internal().err())?;

    let entries: Vec<_> = does.into_iter().map(|doe| (doe, false)).collect();

    Ok(Sep2Xml(derp_mapper::map_doe_list(
        &ctx,
        scope.site_id,
        derp_id,
        &entries,
        total,
        OffsetDateTime::now_utc(),
    )))
}

/// The "active" control list: everything whose window covers now, unioned
/// with recently deleted envelopes so paginating clients observe the
/// cancellation.
pub async fn get_active_controls(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, derp_id)): Path<(i64, i64)>,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<DerControlList>, HttpError> {
    let params = query.params();
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    let now = OffsetDateTime::now_utc();

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let does = store::doe::select_active_does_include_deleted(
        &mut conn,
        scope.aggregator_id,
        scope.site_id,
        now,
        params,
    )
    .await
    .map_err(HttpError::internal().err())?;

    let total = i64::try_from(does.len()).unwrap_or(i64::MAX);
    let entries: Vec<_> = does
        .into_iter()
        .map(|entry| (entry.doe, entry.deleted_time.is_some()))
        .collect();

    Ok(Sep2Xml(derp_mapper::map_doe_list(
        &ctx,
        scope.site_id,
        derp_id,
        &entries,
        total,
        now,
    )))
}

/// Default control: per-site fields win, globally configured fallbacks fill
/// the gaps, nothing at all is a 404.
pub async fn get_default_control(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, derp_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<DefaultDerControl>, HttpError> {
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    let conf = state.conf_handle.get_conf();

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let per_site = store::site::select_default_site_control(&mut conn, scope.site_id)
        .await
        .map_err(HttpError::internal().err())?;

    let merged = store::site::resolve_default_control(per_site.as_ref(), &conf.default_doe)
        .ok_or_else(|| HttpError::not_found().msg("no default control is configured"))?;

    Ok(Sep2Xml(derp_mapper::map_default_control(
        &ctx,
        scope.site_id,
        derp_id,
        &merged,
    )))
}
