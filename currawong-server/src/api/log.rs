use axum::extract::{Path, Query, State};

use crate::http::{CreatedAt, HttpError, Sep2Xml};
use crate::mapper::log_event as log_mapper;
use crate::scope::SiteScope;
use crate::sep2::log_event::{LogEvent, LogEventList};
use crate::store;
use crate::ServerState;

use super::ListQuery;

pub async fn get_log_event_list(
    State(state): State<ServerState>,
    scope: SiteScope,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<LogEventList>, HttpError> {
    let params = query.params();
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let events = store::log_event::select_site_log_events(&state.pool, scope.aggregator_id, scope.site_id, params)
        .await
        .map_err(HttpError::internal().err())?;
    let total =
        store::log_event::count_site_log_events(&state.pool, scope.aggregator_id, scope.site_id, params.after)
            .await
            .map_err(HttpError::internal().err())?;

    Ok(Sep2Xml(log_mapper::map_log_event_list(&ctx, scope.site_id, &events, total)))
}

pub async fn get_log_event(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, log_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<LogEvent>, HttpError> {
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let event = store::log_event::select_site_log_event_by_id(&mut conn, scope.aggregator_id, scope.site_id, log_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such log event"))?;

    Ok(Sep2Xml(log_mapper::map_log_event(&ctx, &event)))
}

pub async fn create_log_event(
    State(state): State<ServerState>,
    scope: SiteScope,
    Sep2Xml(request): Sep2Xml<LogEvent>,
) -> Result<CreatedAt, HttpError> {
    let event = log_mapper::log_event_from_request(scope.site_id, &request)?;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;

    // Make sure the scope can actually see the site before writing to it.
    store::site::select_site_by_id(&mut conn, scope.aggregator_id, scope.site_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such end device"))?;

    let log_id = store::log_event::insert_site_log_event(&mut conn, &event)
        .await
        .map_err(HttpError::internal().err())?;

    Ok(CreatedAt(scope.href(&format!(
        "/edev/{}/log/{log_id}",
        scope.site_id
    ))))
}
