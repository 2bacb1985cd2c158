//! Tariff profile handlers: the pricing function set a site's FSA points at.

use axum::extract::{Path, Query, State};

use crate::http::{HttpError, Sep2Xml};
use crate::mapper::pricing as pricing_mapper;
use crate::scope::SiteScope;
use crate::sep2::pricing::{RateComponentList, TariffProfile, TariffProfileList, TimeTariffInterval, TimeTariffIntervalList};
use crate::store;
use crate::ServerState;

use super::ListQuery;

pub async fn get_tariff_profile_list(
    State(state): State<ServerState>,
    scope: SiteScope,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<TariffProfileList>, HttpError> {
    let params = query.params();
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let tariffs = store::tariff::select_tariffs(&state.pool, params)
        .await
        .map_err(HttpError::internal().err())?;
    let total = store::tariff::count_tariffs(&state.pool, params.after)
        .await
        .map_err(HttpError::internal().err())?;

    Ok(Sep2Xml(pricing_mapper::map_tariff_profile_list(
        &ctx,
        scope.site_id,
        &tariffs,
        total,
    )))
}

pub async fn get_tariff_profile(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, tariff_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<TariffProfile>, HttpError> {
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let tariff = store::tariff::select_tariff_by_id(&mut conn, tariff_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such tariff profile"))?;

    Ok(Sep2Xml(pricing_mapper::map_tariff_profile(&ctx, scope.site_id, &tariff)))
}

pub async fn get_rate_component_list(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, tariff_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<RateComponentList>, HttpError> {
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    store::tariff::select_tariff_by_id(&mut conn, tariff_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such tariff profile"))?;

    let rate_count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM tariff_generated_rate WHERE tariff_id = $1 AND site_id = $2",
    )
    .bind(tariff_id)
    .bind(scope.site_id)
    .fetch_one(&state.pool)
    .await
    .map_err(HttpError::internal().err())?;

    Ok(Sep2Xml(pricing_mapper::map_rate_component_list(
        &ctx,
        scope.site_id,
        tariff_id,
        rate_count,
    )))
}

pub async fn get_time_tariff_interval_list(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, tariff_id, reading_slug)): Path<(i64, i64, String)>,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<TimeTariffIntervalList>, HttpError> {
    let reading = pricing_mapper::reading_from_slug(&reading_slug)
        .ok_or_else(|| HttpError::not_found().msg("no such rate component"))?;

    let params = query.params();
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let rates =
        store::tariff::select_rates_for_site(&state.pool, scope.aggregator_id, tariff_id, scope.site_id, params)
            .await
            .map_err(HttpError::internal().err())?;

    let total: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM tariff_generated_rate r \
         JOIN site s ON s.site_id = r.site_id \
         WHERE s.aggregator_id = $1 AND r.tariff_id = $2 AND r.site_id = $3 AND r.changed_time >= $4",
    )
    .bind(scope.aggregator_id)
    .bind(tariff_id)
    .bind(scope.site_id)
    .bind(params.after)
    .fetch_one(&state.pool)
    .await
    .map_err(HttpError::internal().err())?;

    let intervals: Vec<TimeTariffInterval> = rates
        .iter()
        .map(|rate| pricing_mapper::map_rate(&ctx, rate, reading))
        .collect();

    let slug = pricing_mapper::reading_slug(reading);
    let href = ctx.href(&format!(
        "/edev/{}/tp/{tariff_id}/rc/{slug}/tti",
        scope.site_id
    ));

    Ok(Sep2Xml(pricing_mapper::map_rate_list(&ctx, href, intervals, total)))
}
