//! Admin write paths for site controls: control groups, DOE bulk upserts,
//! default-control vectors and tariff rates.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::DefaultDoeConfiguration;
use crate::http::{HttpError, ServiceError};
use crate::model::SubscriptionResource;
use crate::store;
use crate::store::doe::DoeUpsert;
use crate::store::tariff::RateUpsert;
use crate::ServerState;

use super::aggregator::PageQuery;

#[derive(Debug, Clone, Serialize)]
pub struct SiteControlGroupResponse {
    pub site_control_group_id: i64,
    pub description: String,
    pub primacy: i32,
    pub version: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteControlGroupRequest {
    pub description: String,
    pub primacy: i32,
}

pub async fn list_site_control_groups(
    State(state): State<ServerState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<SiteControlGroupResponse>>, HttpError> {
    let groups = store::doe::select_site_control_groups(
        &state.pool,
        crate::store::ListParams {
            start: page.start,
            limit: page.limit,
            after: OffsetDateTime::UNIX_EPOCH,
        },
    )
    .await
    .map_err(HttpError::internal().err())?;

    Ok(Json(
        groups
            .into_iter()
            .map(|group| SiteControlGroupResponse {
                site_control_group_id: group.site_control_group_id,
                description: group.description,
                primacy: group.primacy,
                version: group.version,
            })
            .collect(),
    ))
}

pub async fn create_site_control_group(
    State(state): State<ServerState>,
    Json(request): Json<SiteControlGroupRequest>,
) -> Result<(StatusCode, Json<SiteControlGroupResponse>), HttpError> {
    let group_id: i64 = sqlx::query_scalar(
        "INSERT INTO site_control_group (description, primacy, version, created_time, changed_time) \
         VALUES ($1, $2, 1, now(), $3) RETURNING site_control_group_id",
    )
    .bind(&request.description)
    .bind(request.primacy)
    .bind(OffsetDateTime::now_utc())
    .fetch_one(&state.pool)
    .await
    .map_err(HttpError::internal().err())?;

    Ok((
        StatusCode::CREATED,
        Json(SiteControlGroupResponse {
            site_control_group_id: group_id,
            description: request.description,
            primacy: request.primacy,
            version: 1,
        }),
    ))
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupDefaultsRequest {
    pub import_limit_active_watts: Option<Decimal>,
    pub export_limit_active_watts: Option<Decimal>,
    pub generation_limit_active_watts: Option<Decimal>,
    pub load_limit_active_watts: Option<Decimal>,
    pub set_energized: Option<bool>,
    pub ramp_rate_percent_per_second: Option<i16>,
}

pub async fn update_site_control_group_defaults(
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    Json(request): Json<GroupDefaultsRequest>,
) -> Result<StatusCode, HttpError> {
    let defaults = DefaultDoeConfiguration {
        import_limit_active_watts: request.import_limit_active_watts,
        export_limit_active_watts: request.export_limit_active_watts,
        generation_limit_active_watts: request.generation_limit_active_watts,
        load_limit_active_watts: request.load_limit_active_watts,
        ramp_rate_percent_per_second: request.ramp_rate_percent_per_second,
    };

    let changed_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    let updated = store::doe::update_site_control_group_defaults(
        &mut tx,
        group_id,
        &defaults,
        request.set_energized,
        changed_time,
    )
    .await
    .map_err(HttpError::internal().err())?;
    if !updated {
        return Err(HttpError::not_found().msg("no such site control group"));
    }
    tx.commit().await.map_err(HttpError::internal().err())?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoeRequest {
    pub site_id: i64,
    pub calculation_log_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    pub duration_seconds: i32,
    pub import_limit_active_watts: Option<Decimal>,
    pub export_limit_active_watts: Option<Decimal>,
    pub generation_limit_active_watts: Option<Decimal>,
    pub load_limit_active_watts: Option<Decimal>,
    pub set_energized: Option<bool>,
    pub ramp_rate_percent_per_second: Option<i16>,
    #[serde(default)]
    pub superseded: bool,
}

/// Bulk DOE upsert: conflicting `(site_id, start_time)` rows are replaced
/// (prior state archived) and one change notification fires for the batch.
pub async fn upsert_does(
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    Json(requests): Json<Vec<DoeRequest>>,
) -> Result<StatusCode, HttpError> {
    if requests.is_empty() {
        return Err(ServiceError::bad_request("no DOEs supplied").into());
    }

    let changed_time = OffsetDateTime::now_utc();
    let upserts: Vec<DoeUpsert> = requests
        .into_iter()
        .map(|request| DoeUpsert {
            site_id: request.site_id,
            site_control_group_id: group_id,
            calculation_log_id: request.calculation_log_id,
            start_time: request.start_time,
            duration_seconds: request.duration_seconds,
            import_limit_active_watts: request.import_limit_active_watts,
            export_limit_active_watts: request.export_limit_active_watts,
            generation_limit_active_watts: request.generation_limit_active_watts,
            load_limit_active_watts: request.load_limit_active_watts,
            set_energized: request.set_energized,
            ramp_rate_percent_per_second: request.ramp_rate_percent_per_second,
            superseded: request.superseded,
        })
        .collect();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    store::doe::upsert_does(&mut tx, &upserts, changed_time)
        .await
        .map_err(HttpError::internal().err())?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    state
        .notifications
        .notify_changed(SubscriptionResource::DynamicOperatingEnvelope, changed_time)
        .await;

    Ok(StatusCode::CREATED)
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultSiteControlRequest {
    pub import_limit_active_watts: Option<Decimal>,
    pub export_limit_active_watts: Option<Decimal>,
    pub generation_limit_active_watts: Option<Decimal>,
    pub load_limit_active_watts: Option<Decimal>,
    pub ramp_rate_percent_per_second: Option<i16>,
}

pub async fn upsert_default_site_control(
    State(state): State<ServerState>,
    Path(site_id): Path<i64>,
    Json(request): Json<DefaultSiteControlRequest>,
) -> Result<StatusCode, HttpError> {
    let control = DefaultDoeConfiguration {
        import_limit_active_watts: request.import_limit_active_watts,
        export_limit_active_watts: request.export_limit_active_watts,
        generation_limit_active_watts: request.generation_limit_active_watts,
        load_limit_active_watts: request.load_limit_active_watts,
        ramp_rate_percent_per_second: request.ramp_rate_percent_per_second,
    };

    let changed_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    store::site::upsert_default_site_control(&mut tx, site_id, &control, changed_time)
        .await
        .map_err(HttpError::internal().err())?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    Ok(StatusCode::CREATED)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateRequest {
    pub site_id: i64,
    pub calculation_log_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    pub duration_seconds: i32,
    pub import_active_price: Decimal,
    pub export_active_price: Decimal,
    pub import_reactive_price: Decimal,
    pub export_reactive_price: Decimal,
}

pub async fn upsert_rates(
    State(state): State<ServerState>,
    Path(tariff_id): Path<i64>,
    Json(requests): Json<Vec<RateRequest>>,
) -> Result<StatusCode, HttpError> {
    if requests.is_empty() {
        return Err(ServiceError::bad_request("no rates supplied").into());
    }

    let changed_time = OffsetDateTime::now_utc();
    let upserts: Vec<RateUpsert> = requests
        .into_iter()
        .map(|request| RateUpsert {
            tariff_id,
            site_id: request.site_id,
            calculation_log_id: request.calculation_log_id,
            start_time: request.start_time,
            duration_seconds: request.duration_seconds,
            import_active_price: request.import_active_price,
            export_active_price: request.export_active_price,
            import_reactive_price: request.import_reactive_price,
            export_reactive_price: request.export_reactive_price,
        })
        .collect();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    store::tariff::upsert_rates(&mut tx, &upserts, changed_time)
        .await
        .map_err(HttpError::internal().err())?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    state
        .notifications
        .notify_changed(SubscriptionResource::TariffGeneratedRate, changed_time)
        .await;

    Ok(StatusCode::CREATED)
}
