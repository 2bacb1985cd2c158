//! Subscription handlers. Notification URIs are validated against the
//! aggregator's registered notification domains so a compromised client
//! can't point our webhooks at arbitrary hosts.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use time::OffsetDateTime;
use url::Url;

use crate::http::{CreatedAt, HttpError, Sep2Xml, ServiceError};
use crate::mapper::pub_sub as sub_mapper;
use crate::model::SubscriptionResource;
use crate::scope::DeviceOrAggregatorScope;
use crate::sep2::pub_sub::{Subscription as WireSubscription, SubscriptionList};
use crate::store;
use crate::ServerState;

use super::ListQuery;

pub async fn get_subscription_list(
    State(state): State<ServerState>,
    scope: DeviceOrAggregatorScope,
    Query(query): Query<ListQuery>,
) -> Result<Sep2Xml<SubscriptionList>, HttpError> {
    let params = query.params();
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let subscriptions =
        store::subscription::select_subscriptions_for_site(&state.pool, scope.aggregator_id, scope.site_id, params)
            .await
            .map_err(HttpError::internal().err())?;
    let total =
        store::subscription::count_subscriptions_for_site(&state.pool, scope.aggregator_id, scope.site_id, params.after)
            .await
            .map_err(HttpError::internal().err())?;

    // Conditions aren't loaded for list rendering; the detail view has them.
    let entries: Vec<_> = subscriptions
        .into_iter()
        .map(|subscription| (subscription, Vec::new()))
        .collect();

    Ok(Sep2Xml(sub_mapper::map_subscription_list(
        &ctx,
        scope.display_site_id,
        &entries,
        total,
    )))
}

pub async fn get_subscription(
    State(state): State<ServerState>,
    scope: DeviceOrAggregatorScope,
    Path((_, subscription_id)): Path<(i64, i64)>,
) -> Result<Sep2Xml<WireSubscription>, HttpError> {
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;

    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    let subscription = store::subscription::select_subscription_by_id(&mut conn, scope.aggregator_id, subscription_id)
        .await
        .map_err(HttpError::internal().err())?
        .ok_or_else(|| HttpError::not_found().msg("no such subscription"))?;

    // A concrete end-device can only see its own subscriptions; the virtual
    // end-device sees everything under the aggregator.
    if let Some(site_id) = scope.site_id {
        if subscription.scoped_site_id != Some(site_id) {
            return Err(HttpError::not_found().msg("no such subscription"));
        }
    }

    let conditions: Vec<crate::model::SubscriptionCondition> =
        sqlx::query_as("SELECT * FROM subscription_condition WHERE subscription_id = $1")
            .bind(subscription.subscription_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(HttpError::internal().err())?;

    Ok(Sep2Xml(sub_mapper::map_subscription(&ctx, &subscription, &conditions)))
}

async fn validate_notification_uri(
    state: &ServerState,
    aggregator_id: i64,
    notification_uri: &str,
) -> Result<(), ServiceError> {
    let url = Url::parse(notification_uri)
        .map_err(|_| ServiceError::bad_request("notificationURI is not a valid URL"))?;

    if url.scheme() != "https" {
        return Err(ServiceError::bad_request("notificationURI must be https"));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ServiceError::bad_request("notificationURI has no host"))?;

    let mut conn = state.pool.acquire().await.map_err(anyhow::Error::from)?;
    let domains = store::aggregator::select_aggregator_domains(&mut conn, aggregator_id)
        .await
        .map_err(anyhow::Error::from)?;

    if !domains.iter().any(|d| d.domain.eq_ignore_ascii_case(host)) {
        return Err(ServiceError::bad_request(format!(
            "notificationURI domain {host} is not registered for this aggregator"
        )));
    }

    Ok(())
}

pub async fn create_subscription(
    State(state): State<ServerState>,
    scope: DeviceOrAggregatorScope,
    Sep2Xml(request): Sep2Xml<WireSubscription>,
) -> Result<CreatedAt, HttpError> {
    let ctx = super::mapper_context(&state, scope.href_prefix.clone(), scope.iana_pen).await;
    let changed_time = OffsetDateTime::now_utc();

    let insert = sub_mapper::subscription_from_request(&ctx, scope.aggregator_id, &request, changed_time)?;

    // The subscribedResource's end-device must agree with the posted path.
    if insert.scoped_site_id != scope.site_id {
        return Err(ServiceError::bad_request(format!(
            "mismatch on subscribedResource EndDevice id {:?}, expected {:?}",
            insert.scoped_site_id, scope.site_id
        ))
        .into());
    }

    validate_notification_uri(&state, scope.aggregator_id, &insert.notification_uri).await?;

    // Resource-id filters must point at something the scope can reach.
    let mut conn = state.pool.acquire().await.map_err(HttpError::internal().err())?;
    if let Some(resource_id) = insert.resource_id {
        let valid = match insert.resource_type {
            SubscriptionResource::Reading => {
                store::reading::select_reading_type_by_id(&mut conn, scope.aggregator_id, resource_id)
                    .await
                    .map_err(HttpError::internal().err())?
                    .is_some()
            }
            SubscriptionResource::TariffGeneratedRate => {
                store::tariff::select_tariff_by_id(&mut conn, resource_id)
                    .await
                    .map_err(HttpError::internal().err())?
                    .is_some()
            }
            SubscriptionResource::DynamicOperatingEnvelope => {
                store::doe::select_doe_for_scope(&mut conn, scope.aggregator_id, insert.scoped_site_id, resource_id)
                    .await
                    .map_err(HttpError::internal().err())?
                    .is_some()
            }
            SubscriptionResource::Site | SubscriptionResource::DefaultSiteControl => false,
        };
        if !valid {
            return Err(ServiceError::bad_request(format!(
                "subscribedResource id {resource_id} is not accessible in this scope"
            ))
            .into());
        }
    }

    let subscription_id = store::subscription::insert_subscription(&mut conn, &insert)
        .await
        .map_err(HttpError::internal().err())?;

    info!(
        site_id = scope.display_site_id,
        subscription_id,
        resource = ?insert.resource_type,
        "Subscription created"
    );

    Ok(CreatedAt(scope.href(&format!(
        "/edev/{}/sub/{subscription_id}",
        scope.display_site_id
    ))))
}

pub async fn delete_subscription(
    State(state): State<ServerState>,
    scope: DeviceOrAggregatorScope,
    Path((_, subscription_id)): Path<(i64, i64)>,
) -> Result<StatusCode, HttpError> {
    let deleted_time = OffsetDateTime::now_utc();

    let mut tx = state.pool.begin().await.map_err(HttpError::internal().err())?;
    let removed =
        store::subscription::delete_subscription(&mut tx, scope.aggregator_id, subscription_id, deleted_time)
            .await
            .map_err(HttpError::internal().err())?;
    if !removed {
        return Err(HttpError::not_found().msg("no such subscription"));
    }
    tx.commit().await.map_err(HttpError::internal().err())?;

    Ok(StatusCode::NO_CONTENT)
}
