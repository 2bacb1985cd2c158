use axum::extract::State;
use axum::http::StatusCode;
use time::OffsetDateTime;

use crate::http::{HttpError, Sep2Xml, ServiceError};
use crate::mapper::{end_device as edev_mapper, MapperContext};
use crate::model::SubscriptionResource;
use crate::nmi;
use crate::scope::SiteScope;
use crate::sep2::end_device::ConnectionPoint;
use crate::store;
use crate::ServerState;

pub async fn get_connection_point(
    State(state): State<ServerState>,
    scope: SiteScope,
) -> Result<Sep2Xml<ConnectionPoint>, HttpError> {
    let ctx = MapperContext {
        href_prefix: scope.href_prefix.clone(),
        iana_pen: scope.iana_pen,
        pow10: 0,
    };

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let site = store::site::select_site_by_id(&mut conn, scope.aggregator_id, scope.site_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such end device"))?;

    Ok(Sep2Xml(edev_mapper::map_connection_point(&ctx, &site)))
}

/// Sets (POST) or replaces (PUT) the site's connection point id (NMI).
pub async fn put_connection_point(
    State(state): State<ServerState>,
    scope: SiteScope,
    Sep2Xml(request): Sep2Xml<ConnectionPoint>,
) -> Result<StatusCode, HttpError> {
    let conf = state.conf_handle.get_conf();

    let nmi = request
        .connection_point_id
        .as_deref()
        .map(str::trim)
        .filter(|nmi| !nmi.is_empty());

    if let Some(nmi) = nmi {
        if conf.nmi_validation_enabled
            && !nmi::is_valid_nmi(nmi, conf.nmi_validation_participant_id.as_deref())
        {
            return Err(ServiceError::bad_request(format!("'{nmi}' is not a valid NMI")).into());
        }
    }

    let changed_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    store::site::update_site_nmi(&mut tx, scope.aggregator_id, scope.site_id, nmi, changed_time).await?;
    tx.commit().await.map_err(HttpError::internal().err())?;

    state
        .notifications
        .notify_changed(SubscriptionResource::Site, changed_time)
        .await;

    Ok(StatusCode::CREATED)
}
