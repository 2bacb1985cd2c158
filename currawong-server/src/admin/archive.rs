//! Archive time-range reads for audit tooling. No aggregator scoping: this
//! is the operator's view of everything.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::http::HttpError;
use crate::model::{ArchiveDynamicOperatingEnvelope, ArchiveSite, ArchiveTariffGeneratedRate};
use crate::store::archive::{self, specs, ArchiveSpec};
use crate::ServerState;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ArchiveQuery {
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub period_end: OffsetDateTime,
    #[serde(default)]
    pub only_deletes: bool,
    #[serde(default)]
    pub start: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchivePage<T> {
    pub total: i64,
    pub start: i64,
    pub limit: i64,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveRow {
    pub archive_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub archive_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_time: Option<OffsetDateTime>,
    pub resource_id: i64,
    pub site_id: i64,
}

impl From<ArchiveSite> for ArchiveRow {
    fn from(row: ArchiveSite) -> Self {
        ArchiveRow {
            archive_id: row.archive_id,
            archive_time: row.archive_time,
            deleted_time: row.deleted_time,
            resource_id: row.site_id,
            site_id: row.site_id,
        }
    }
}

impl From<ArchiveDynamicOperatingEnvelope> for ArchiveRow {
    fn from(row: ArchiveDynamicOperatingEnvelope) -> Self {
        ArchiveRow {
            archive_id: row.archive_id,
            archive_time: row.archive_time,
            deleted_time: row.deleted_time,
            resource_id: row.dynamic_operating_envelope_id,
            site_id: row.site_id,
        }
    }
}

impl From<ArchiveTariffGeneratedRate> for ArchiveRow {
    fn from(row: ArchiveTariffGeneratedRate) -> Self {
        ArchiveRow {
            archive_id: row.archive_id,
            archive_time: row.archive_time,
            deleted_time: row.deleted_time,
            resource_id: row.tariff_generated_rate_id,
            site_id: row.site_id,
        }
    }
}

fn spec_for(resource: &str) -> Option<&'static ArchiveSpec> {
    match resource {
        "edev" => Some(&specs::SITE),
        "doe" => Some(&specs::DOE),
        "rate" => Some(&specs::TARIFF_GENERATED_RATE),
        _ => None,
    }
}

pub async fn read_archive(
    State(state): State<ServerState>,
    Path(resource): Path<String>,
    Query(query): Query<ArchiveQuery>,
) -> Result<Json<ArchivePage<ArchiveRow>>, HttpError> {
    let spec = spec_for(&resource).ok_or_else(|| HttpError::not_found().msg("no such archive"))?;

    let total = archive::count_archive_for_period(
        &state.pool,
        spec,
        query.period_start,
        query.period_end,
        query.only_deletes,
    )
    .await
    .map_err(HttpError::internal().err())?;

    let items: Vec<ArchiveRow> = match resource.as_str() {
        "edev" => archive::select_archive_for_period::<ArchiveSite>(
            &state.pool,
            spec,
            query.start,
            query.limit,
            query.period_start,
            query.period_end,
            query.only_deletes,
        )
        .await
        .map_err(HttpError::internal().err())?
        .into_iter()
        .map(ArchiveRow::from)
        .collect(),
        "doe" => archive::select_archive_for_period::<ArchiveDynamicOperatingEnvelope>(
            &state.pool,
            spec,
            query.start,
            query.limit,
            query.period_start,
            query.period_end,
            query.only_deletes,
        )
        .await
        .map_err(HttpError::internal().err())?
        .into_iter()
        .map(ArchiveRow::from)
        .collect(),
        _ => archive::select_archive_for_period::<ArchiveTariffGeneratedRate>(
            &state.pool,
            spec,
            query.start,
            query.limit,
            query.period_start,
            query.period_end,
            query.only_deletes,
        )
        .await
        .map_err(HttpError::internal().err())?
        .into_iter()
        .map(ArchiveRow::from)
        .collect(),
    };

    Ok(Json(ArchivePage {
        total,
        start: query.start,
        limit: query.limit,
        items,
    }))
}
