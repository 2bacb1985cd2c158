//! Response function set: clients acknowledge DOEs and tariff rates here.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};

use crate::http::{CreatedAt, HttpError, Sep2Xml, ServiceError};
use crate::mapper::response as response_mapper;
use crate::model::response::ResponseType;
use crate::mrid::{self, MridType, ResponseSetType};
use crate::scope::DeviceOrAggregatorScope;
use crate::sep2::response::{Response, ResponseList, ResponseSet, ResponseSetList};
use crate::store;
use crate::ServerState;

use super::ListQuery;

fn parse_list_slug(slug: &str) -> Result<ResponseSetType, HttpError> {
    ResponseSetType::from_slug(slug).ok_or_else(|| HttpError::not_found().msg("no such response set"))
}

pub async fn get_response_set_list(
    State(state): State<ServerState>,
    scope: DeviceOrAggregatorScope,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<ResponseSetList>, HttpError> {
    let params = query.params();
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    Ok(Sep2Xml(response_mapper::map_response_set_list(
        &ctx,
        scope.display_site_id,
        params.start,
        params.limit,
    )))
}

pub async fn get_response_set(
    State(state): State<ServerState>,
    scope: DeviceOrAggregatorScope,
    Path((_, slug)): Path<(i64, String)>,
) -> Result<Sep2Xml<ResponseSet>, HttpError> {
    let set_type = parse_list_slug(&slug)?;
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    Ok(Sep2Xml(response_mapper::map_response_set(
        &ctx,
        scope.display_site_id,
        set_type,
    )))
}

/// Resolves site_id → LFDI for rendering `endDeviceLFDI`.
async fn site_lfdis(state: &ServerState, site_ids: Vec<i64>) -> Result<HashMap<i64, String>, HttpError> {
    if site_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT site_id, lfdi FROM site WHERE site_id = ANY($1)")
        .bind(&site_ids)
        .fetch_all(&state.pool)
        .await
        .map_err(HttpError::internal().err())?;
    Ok(rows.into_iter().collect())
}

pub async fn get_response_list(
    State(state): State<ServerState>,
    scope: DeviceOrAggregatorScope,
    Path((_, slug)): Path<(i64, String)>,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<ResponseList>, HttpError> {
    let set_type = parse_list_slug(&slug)?;
    let params = query.params();
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let (responses, total) = match set_type {
        ResponseSetType::DynamicOperatingEnvelopes => {
            let rows = store::response::select_doe_responses(&state.pool, scope.aggregator_id, scope.site_id, params)
                .await
                .map_err(HttpError::internal().err())?;
            let total =
                store::response::count_doe_responses(&state.pool, scope.aggregator_id, scope.site_id, params.after)
                    .await
                    .map_err(HttpError::internal().err())?;

            let lfdis = site_lfdis(&state, rows.iter().map(|r| r.site_id).collect()).await?;
            let responses = rows
                .iter()
                .map(|row| {
                    let lfdi = lfdis.get(&row.site_id).map(String::as_str).unwrap_or("");
                    response_mapper::map_doe_response(&ctx, lfdi, row)
                })
                .collect();
            (responses, total)
        }
        ResponseSetType::TariffGeneratedRates => {
            let rows = store::response::select_rate_responses(&state.pool, scope.aggregator_id, scope.site_id, params)
                .await
                .map_err(HttpError::internal().err())?;
            let total =
                store::response::count_rate_responses(&state.pool, scope.aggregator_id, scope.site_id, params.after)
                    .await
                    .map_err(HttpError::internal().err())?;

            let lfdis = site_lfdis(&state, rows.iter().map(|r| r.site_id).collect()).await?;
            let responses = rows
                .iter()
                .map(|row| {
                    let lfdi = lfdis.get(&row.site_id).map(String::as_str).unwrap_or("");
                    response_mapper::map_rate_response(&ctx, lfdi, row)
                })
                .collect();
            (responses, total)
        }
    };

    Ok(Sep2Xml(response_mapper::map_response_list(
        &ctx,
        scope.display_site_id,
        set_type,
        responses,
        total,
    )))
}

pub async fn get_response(
    State(state): State<ServerState>,
    scope: DeviceOrAggregatorScope,
    Path((_, slug, response_id)): Path<(i64, String, i64)>,
) -> Result<Sep2Xml<Response>, HttpError> {
    let set_type = parse_list_slug(&slug)?;
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;

    let (site_id, response) = match set_type {
        ResponseSetType::DynamicOperatingEnvelopes => {
            let row = store::response::select_doe_response_for_scope(
                &mut conn,
                scope.aggregator_id,
                scope.site_id,
                response_id,
            )
            .await
            .map_err(HttpError::internal().err())?
            .ok_or_else(|| HttpError::not_found().msg("no such response"))?;
            (row.site_id, ResponseRow::Doe(row))
        }
        ResponseSetType::TariffGeneratedRates => {
            let row = store::response::select_rate_response_for_scope(
                &mut conn,
                scope.aggregator_id,
                scope.site_id,
                response_id,
            )
            .await
            .map_err(HttpError::internal().err())?
            .ok_or_else(|| HttpError::not_found().msg("no such response"))?;
            (row.site_id, ResponseRow::Rate(row))
        }
    };

    let lfdis = site_lfdis(&state, vec![site_id]).await?;
    let lfdi = lfdis.get(&site_id).map(String::as_str).unwrap_or("");

    let mapped = match response {
        ResponseRow::Doe(row) => response_mapper::map_doe_response(&ctx, lfdi, &row),
        ResponseRow::Rate(row) => response_mapper::map_rate_response(&ctx, lfdi, &row),
    };

    Ok(Sep2Xml(mapped))
}

enum ResponseRow {
    Doe(crate::model::DoeResponse),
    Rate(crate::model::RateResponse),
}

/// `POST /edev/{id}/rsps/{list}/rsp` — the §4.9 flow: decode and validate
/// the subject MRID, re-fetch the referenced entity inside the caller's
/// scope, and persist the acknowledgement. A subject that exists somewhere
/// but not in scope is indistinguishable from a bogus one: BadRequest.
pub async fn create_response(
    State(state): State<ServerState>,
    scope: DeviceOrAggregatorScope,
    Path((_, slug)): Path<(i64, String)>,
    Sep2Xml(request): Sep2Xml<Response>,
) -> Result<CreatedAt, HttpError> {
    let set_type = parse_list_slug(&slug)?;

    let mrid_type = mrid::decode_and_validate_mrid_type(scope.iana_pen, &request.subject).map_err(|error| {
        warn!(%error, subject = %request.subject, "Response subject failed MRID validation");
        ServiceError::bad_request(format!(
            "subject '{}' doesn't reference a valid MRID from this utility server",
            request.subject
        ))
    })?;

    let response_type = request
        .status
        .and_then(ResponseType::from_i32)
        .ok_or_else(|| ServiceError::bad_request("missing or unknown response status"))?;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;

    let (site_id, response_id) = match set_type {
        ResponseSetType::DynamicOperatingEnvelopes => {
            if mrid_type != MridType::DynamicOperatingEnvelope {
                return Err(ServiceError::bad_request(format!(
                    "{mrid_type:?} responses are not accepted to this list"
                ))
                .into());
            }
            let doe_id = mrid::decode_doe_mrid(&request.subject)
                .map_err(|e| ServiceError::bad_request(e.to_string()))?;

            let doe = store::doe::select_doe_for_scope(&mut conn, scope.aggregator_id, scope.site_id, doe_id)
                .await
                .map_err(HttpError::internal().err())?
                .ok_or_else(|| {
                    ServiceError::bad_request(format!(
                        "subject '{}' references a control not available on this utility server",
                        request.subject
                    ))
                })?;

            let row = store::response::insert_doe_response(
                &mut conn,
                doe.dynamic_operating_envelope_id,
                doe.site_id,
                response_type,
            )
            .await
            .map_err(HttpError::internal().err())?;
            (row.site_id, row.doe_response_id)
        }
        ResponseSetType::TariffGeneratedRates => {
            if mrid_type != MridType::TimeTariffInterval {
                return Err(ServiceError::bad_request(format!(
                    "{mrid_type:?} responses are not accepted to this list"
                ))
                .into());
            }
            let (rate_id, pricing_reading) = mrid::decode_time_tariff_interval_mrid(&request.subject)
                .map_err(|e| ServiceError::bad_request(e.to_string()))?;

            let rate = store::tariff::select_rate_for_scope(&mut conn, scope.aggregator_id, scope.site_id, rate_id)
                .await
                .map_err(HttpError::internal().err())?
                .ok_or_else(|| {
                    ServiceError::bad_request(format!(
                        "subject '{}' references a price not available on this utility server",
                        request.subject
                    ))
                })?;

            let row = store::response::insert_rate_response(
                &mut conn,
                rate.tariff_generated_rate_id,
                rate.site_id,
                pricing_reading,
                response_type,
            )
            .await
            .map_err(HttpError::internal().err())?;
            (row.site_id, row.rate_response_id)
        }
    };

    Ok(CreatedAt(scope.href(&format!(
        "/edev/{site_id}/rsps/{slug}/rsp/{response_id}"
    ))))
}
