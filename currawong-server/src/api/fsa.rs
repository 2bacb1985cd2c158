use axum::extract::{Path, State};

use crate::http::{HttpError, Sep2Xml};
use crate::mapper::{fsa as fsa_mapper, PUBLIC_FSA_ID};
use crate::scope::SiteScope;
use crate::sep2::fsa::{FunctionSetAssignments, FunctionSetAssignmentsList};
use crate::store;
use crate::ServerState;

pub async fn get_fsa_list(
    State(state): State<ServerState>,
    scope: SiteScope,
) -> Result<Sep2Xml<FunctionSetAssignmentsList>, HttpError> {
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    let runtime_config = store::runtime_config::fetch_runtime_config(&state.pool).await;

    let tariff_count = store::tariff::count_tariffs(&state.pool, time::OffsetDateTime::UNIX_EPOCH)
        .await
        .map_err(HttpError::internal().err())?;

    Ok(Sep2Xml(fsa_mapper::map_fsa_list(
        &ctx,
        scope.site_id,
        tariff_count,
        Some(runtime_config.fsal_pollrate_seconds),
    )))
}

pub async fn get_fsa(
    State(state): State<ServerState>,
    scope: SiteScope,
    Path((_, fsa_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<FunctionSetAssignments>, HttpError> {
    if fsa_id != PUBLIC_FSA_ID {
        return Err(HttpError::not_found().msg("no such function set assignment"));
    }

    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    let tariff_count = store::tariff::count_tariffs(&state.pool, time::OffsetDateTime::UNIX_EPOCH)
        .await
        .map_err(HttpError::internal().err())?;

    Ok(Sep2Xml(fsa_mapper::map_fsa(&ctx, scope.site_id, tariff_count)))
}
