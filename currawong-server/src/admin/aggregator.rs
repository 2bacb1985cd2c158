use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::http::HttpError;
use crate::store;
use crate::ServerState;

#[derive(Debug, Clone, Serialize)]
pub struct AggregatorResponse {
    pub aggregator_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorRequest {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub start: i64,
    #[serde(default = "default_page_limit")]
    pub limit: i64,
}

fn default_page_limit() -> i64 {
    100
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResponse<T> {
    pub total: i64,
    pub start: i64,
    pub limit: i64,
    pub items: Vec<T>,
}

pub async fn list_aggregators(
    State(state): State<ServerState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PageResponse<AggregatorResponse>>, HttpError> {
    let items = store::aggregator::select_aggregators(&state.pool, page.start, page.limit)
        .await
        .map_err(HttpError::internal().err())?;
    let total = store::aggregator::count_aggregators(&state.pool)
        .await
        .map_err(HttpError::internal().err())?;

    Ok(Json(PageResponse {
        total,
        start: page.start,
        limit: page.limit,
        items: items
            .into_iter()
            .map(|aggregator| AggregatorResponse {
                aggregator_id: aggregator.aggregator_id,
                name: aggregator.name,
            })
            .collect(),
    }))
}

pub async fn get_aggregator(
    State(state): State<ServerState>,
    Path(aggregator_id): Path<i64>,
) -> Result<Json<AggregatorResponse>, HttpError> {
    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let aggregator = store::aggregator::select_aggregator(&mut conn, aggregator_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such aggregator"))?;

    Ok(Json(AggregatorResponse {
        aggregator_id: aggregator.aggregator_id,
        name: aggregator.name,
    }))
}

pub async fn create_aggregator(
    State(state): State<ServerState>,
    Json(request): Json<AggregatorRequest>,
) -> Result<(StatusCode, Json<AggregatorResponse>), HttpError> {
    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let aggregator_id =
        store::aggregator::insert_aggregator(&mut conn, &request.name, OffsetDateTime::now_utc())
            .await
            .map_err(HttpError::internal().err())?;

    Ok((
        StatusCode::CREATED,
        Json(AggregatorResponse {
            aggregator_id,
            name: request.name,
        }),
    ))
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateResponse {
    pub certificate_id: i64,
    pub lfdi: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CertificateRequest {
    pub lfdi: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
}

pub async fn list_certificates(
    State(state): State<ServerState>,
    Path(aggregator_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<CertificateResponse>>, HttpError> {
    let certificates =
        store::aggregator::select_certificates_for_aggregator(&state.pool, aggregator_id, page.start, page.limit)
            .await
            .map_err(HttpError::internal().err())?;

    Ok(Json(
        certificates
            .into_iter()
            .map(|certificate| CertificateResponse {
                certificate_id: certificate.certificate_id,
                lfdi: certificate.lfdi,
                expiry: certificate.expiry,
            })
            .collect(),
    ))
}

/// Assigning a certificate makes its LFDI authenticate as this aggregator.
/// The cache refreshes on its next miss; force it so the change is visible
/// immediately.
pub async fn assign_certificate(
    State(state): State<ServerState>,
    Path(aggregator_id): Path<i64>,
    Json(request): Json<CertificateRequest>,
) -> Result<StatusCode, HttpError> {
    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    store::aggregator::assign_certificate(&mut conn, aggregator_id, &request.lfdi, request.expiry)
        .await
        .map_err(HttpError::internal().err())?;
    drop(conn);

    state.cert_cache.force_update(state.pool.clone()).await;

    Ok(StatusCode::CREATED)
}

pub async fn unassign_certificate(
    State(state): State<ServerState>,
    Path((aggregator_id, certificate_id)): Path<(i64, i64)>,
) -> Result<StatusCode, HttpError> {
    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let removed = store::aggregator::unassign_certificate(&mut conn, aggregator_id, certificate_id)
        .await
        .map_err(HttpError::internal().err())?;
    if !removed {
        return Err(HttpError::not_found().msg("no such certificate assignment"));
    }
    drop(conn);

    state.cert_cache.force_update(state.pool.clone()).await;

    Ok(StatusCode::NO_CONTENT)
}
