//! Mirror usage point handlers: channel registration and reading ingest.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use time::OffsetDateTime;

use crate::http::{CreatedAt, HttpError, Sep2Xml, ServiceError};
use crate::mapper::metering as metering_mapper;
use crate::model::SubscriptionResource;
use crate::scope::{CertificateType, UnregisteredScope};
use crate::sep2::metering::{MirrorMeterReading, MirrorUsagePoint, MirrorUsagePointList};
use crate::store;
use crate::store::reading::ReadingTypeKey;
use crate::ServerState;

use super::ListQuery;

pub async fn get_mup_list(
    State(state): State<ServerState>,
    scope: UnregisteredScope,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<MirrorUsagePointList>, HttpError> {
    let params = query.params();
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    let runtime_config = store::runtime_config::fetch_runtime_config(&state.pool).await;

    let types = store::reading::select_reading_types_for_aggregator(&state.pool, scope.aggregator_id, params)
        .await
        .map_err(HttpError::internal().err())?;
    let total =
        store::reading::count_reading_types_for_aggregator(&state.pool, scope.aggregator_id, params.after)
            .await
            .map_err(HttpError::internal().err())?;

    Ok(Sep2Xml(metering_mapper::map_mirror_usage_point_list(
        &ctx,
        &types,
        total,
        Some(runtime_config.mup_postrate_seconds),
    )))
}

pub async fn get_mup(
    State(state): State<ServerState>,
    scope: UnregisteredScope,
    Path(mup_id): Path<i64>,
) -> Result<Sep2Xml<MirrorUsagePoint>, HttpError> {
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let srt = store::reading::select_reading_type_by_id(&mut conn, scope.aggregator_id, mup_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such mirror usage point"))?;

    Ok(Sep2Xml(metering_mapper::map_mirror_usage_point(&ctx, &srt)))
}

fn reading_type_key(
    scope: &UnregisteredScope,
    site_id: i64,
    request: &MirrorMeterReading,
) -> ReadingTypeKey {
    let rt = request.reading_type.clone().unwrap_or_default();
    ReadingTypeKey {
        aggregator_id: scope.aggregator_id,
        site_id,
        uom: rt.uom.unwrap_or(0),
        kind: rt.kind.unwrap_or(0),
        phase: rt.phase.unwrap_or(0),
        flow_direction: rt.flow_direction.unwrap_or(0),
        data_qualifier: rt.data_qualifier.unwrap_or(0),
        accumulation_behaviour: rt.accumulation_behaviour.unwrap_or(0),
    }
}

/// Registers a mirror usage point. The channel is identified by its
/// measurement 8-tuple; re-posting the same tuple refreshes it (returning
/// the same id), which is what sep2 prescribes for MUP creation.
pub async fn create_mup(
    State(state): State<ServerState>,
    scope: UnregisteredScope,
    Sep2Xml(request): Sep2Xml<MirrorUsagePoint>,
) -> Result<CreatedAt, HttpError> {
    let device_lfdi = request.device_lfdi.to_lowercase();

    // Device certs may only mirror their own device.
    if scope.source == CertificateType::DeviceCert && device_lfdi != scope.lfdi.to_lowercase() {
        return Err(ServiceError::forbidden("deviceLFDI must match the client certificate").into());
    }

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;

    let site: crate::model::Site =
        sqlx::query_as("SELECT * FROM site WHERE aggregator_id = $1 AND lower(lfdi) = lower($2)")
            .bind(scope.aggregator_id)
            .bind(&device_lfdi)
            .fetch_optional(&mut *conn)
            .await
            .map_err(HttpError::internal().err())?
            .ok_or_else(|| {
                ServiceError::bad_request(format!("deviceLFDI {device_lfdi} has no registered EndDevice"))
            })?;

    let Some(first_mmr) = request.mirror_meter_readings.first() else {
        return Err(ServiceError::bad_request("MirrorUsagePoint carries no MirrorMeterReading").into());
    };

    let changed_time = OffsetDateTime::now_utc();
    let rt = first_mmr.reading_type.clone().unwrap_or_default();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    let mup_id = store::reading::upsert_reading_type(
        &mut tx,
        &reading_type_key(&scope, site.site_id, first_mmr),
        &device_lfdi,
        rt.power_of_ten_multiplier.unwrap_or(0),
        rt.interval_length.unwrap_or(0),
        changed_time,
    )
    .await
    .map_err(HttpError::internal().err())?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    Ok(CreatedAt(crate::http::generate_href(
        scope.href_prefix.as_deref(),
        &format!("/mup/{mup_id}"),
    )))
}

/// `POST /mup/{id}` ingests readings for the channel. Conflicting samples
/// (same channel + period start) overwrite value, quality and local id.
pub async fn post_readings(
    State(state): State<ServerState>,
    scope: UnregisteredScope,
    Path(mup_id): Path<i64>,
    Sep2Xml(request): Sep2Xml<MirrorMeterReading>,
) -> Result<StatusCode, HttpError> {
    let changed_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    store::reading::select_reading_type_by_id(&mut tx, scope.aggregator_id, mup_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such mirror usage point"))?;

    let upserts = metering_mapper::readings_from_mirror(mup_id, &request);
    if upserts.is_empty() {
        return Err(ServiceError::bad_request("MirrorMeterReading carries no readings").into());
    }

    store::reading::upsert_readings(&mut tx, &upserts, changed_time)
        .await
        .map_err(HttpError::internal().err())?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    state
        .notifications
        .notify_changed(SubscriptionResource::Reading, changed_time)
        .await;

    Ok(StatusCode::CREATED)
}

pub async fn delete_mup(
    State(state): State<ServerState>,
    scope: UnregisteredScope,
    Path(mup_id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    let deleted_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    let removed = store::reading::delete_reading_type(&mut tx, scope.aggregator_id, mup_id, deleted_time)
        .await
        .map_err(HttpError::internal().err())?;
    if !removed {
        return Err(HttpError::not_found().msg("no such mirror usage point"));
    }
    tx.commit().await.map_err(HttpError::internal().err())?;

    state
        .notifications
        .notify_changed(SubscriptionResource::Reading, deleted_time)
        .await;

    Ok(StatusCode::NO_CONTENT)
}
