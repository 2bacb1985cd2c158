use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;

use crate::model::{Subscription, SubscriptionCondition, SubscriptionResource, TransmitNotificationLog};
use crate::store::archive::{self, specs};
use crate::store::ListParams;

pub async fn select_subscription_by_id(
    conn: &mut PgConnection,
    aggregator_id: i64,
    subscription_id: i64,
) -> sqlx::Result<Option<Subscription>> {
    sqlx::query_as("SELECT * FROM subscription WHERE aggregator_id = $1 AND subscription_id = $2")
        .bind(aggregator_id)
        .bind(subscription_id)
        .fetch_optional(conn)
        .await
}

/// Subscriptions visible under one end-device. A `site_id` of `None` (the
/// virtual end-device) lists the aggregator's unscoped subscriptions too.
pub async fn select_subscriptions_for_site(
    pool: &PgPool,
    aggregator_id: i64,
    site_id: Option<i64>,
    params: ListParams,
) -> sqlx::Result<Vec<Subscription>> {
    sqlx::query_as(
        "SELECT * FROM subscription \
         WHERE aggregator_id = $1 AND ($2::bigint IS NULL OR scoped_site_id = $2) AND changed_time >= $3 \
         ORDER BY changed_time DESC, subscription_id ASC OFFSET $4 LIMIT $5",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(params.after)
    .bind(params.start)
    .bind(params.limit)
    .fetch_all(pool)
    .await
}

pub async fn count_subscriptions_for_site(
    pool: &PgPool,
    aggregator_id: i64,
    site_id: Option<i64>,
    after: OffsetDateTime,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "SELECT count(*) FROM subscription \
         WHERE aggregator_id = $1 AND ($2::bigint IS NULL OR scoped_site_id = $2) AND changed_time >= $3",
    )
    .bind(aggregator_id)
    .bind(site_id)
    .bind(after)
    .fetch_one(pool)
    .await
}

/// Subscription fields accepted from a client.
#[derive(Debug, Clone)]
pub struct SubscriptionInsert {
    pub aggregator_id: i64,
    pub resource_type: SubscriptionResource,
    pub resource_id: Option<i64>,
    pub scoped_site_id: Option<i64>,
    pub notification_uri: String,
    pub entity_limit: i32,
    pub conditions: Vec<(i64, i64)>,
    pub changed_time: OffsetDateTime,
}

pub async fn insert_subscription(
    conn: &mut PgConnection,
    subscription: &SubscriptionInsert,
) -> sqlx::Result<i64> {
    let subscription_id: i64 = sqlx::query_scalar(
        "INSERT INTO subscription \
             (aggregator_id, resource_type, resource_id, scoped_site_id, notification_uri, entity_limit, \
              created_time, changed_time) \
         VALUES ($1, $2, $3, $4, $5, $6, now(), $7) \
         RETURNING subscription_id",
    )
    .bind(subscription.aggregator_id)
    .bind(subscription.resource_type)
    .bind(subscription.resource_id)
    .bind(subscription.scoped_site_id)
    .bind(&subscription.notification_uri)
    .bind(subscription.entity_limit)
    .bind(subscription.changed_time)
    .fetch_one(&mut *conn)
    .await?;

    for (lower, upper) in &subscription.conditions {
        sqlx::query(
            "INSERT INTO subscription_condition \
                 (subscription_id, attribute, lower_threshold, upper_threshold) \
             VALUES ($1, 0, $2, $3)",
        )
        .bind(subscription_id)
        .bind(lower)
        .bind(upper)
        .execute(&mut *conn)
        .await?;
    }

    Ok(subscription_id)
}

pub async fn delete_subscription(
    conn: &mut PgConnection,
    aggregator_id: i64,
    subscription_id: i64,
    deleted_time: OffsetDateTime,
) -> sqlx::Result<bool> {
    if select_subscription_by_id(conn, aggregator_id, subscription_id).await?.is_none() {
        return Ok(false);
    }

    archive::delete_into_archive(
        conn,
        &specs::SUBSCRIPTION_CONDITION,
        "subscription_id = $1",
        subscription_id,
        deleted_time,
    )
    .await?;
    let removed = archive::delete_into_archive(
        conn,
        &specs::SUBSCRIPTION,
        "subscription_id = $1",
        subscription_id,
        deleted_time,
    )
    .await?;

    Ok(removed > 0)
}

/// Candidate subscriptions for a change in `resource`: everything under the
/// aggregator with the matching resource type. Actual batch-key, resource-id
/// and condition checks happen in the matcher.
pub async fn select_subscriptions_for_resource(
    conn: &mut PgConnection,
    aggregator_id: i64,
    resource: SubscriptionResource,
) -> sqlx::Result<Vec<(Subscription, Vec<SubscriptionCondition>)>> {
    let subscriptions: Vec<Subscription> =
        sqlx::query_as("SELECT * FROM subscription WHERE aggregator_id = $1 AND resource_type = $2")
            .bind(aggregator_id)
            .bind(resource)
            .fetch_all(&mut *conn)
            .await?;

    let ids: Vec<i64> = subscriptions.iter().map(|s| s.subscription_id).collect();
    let conditions: Vec<SubscriptionCondition> =
        sqlx::query_as("SELECT * FROM subscription_condition WHERE subscription_id = ANY($1)")
            .bind(&ids)
            .fetch_all(conn)
            .await?;

    Ok(subscriptions
        .into_iter()
        .map(|subscription| {
            let own: Vec<SubscriptionCondition> = conditions
                .iter()
                .filter(|c| c.subscription_id == subscription.subscription_id)
                .cloned()
                .collect();
            (subscription, own)
        })
        .collect())
}

pub async fn insert_transmit_log(
    pool: &PgPool,
    log: &TransmitNotificationLog,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO transmit_notification_log \
             (subscription_id_snapshot, transmit_time, transmit_duration_ms, notification_size_bytes, \
              attempt, http_status_code) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(log.subscription_id_snapshot)
    .bind(log.transmit_time)
    .bind(log.transmit_duration_ms)
    .bind(log.notification_size_bytes)
    .bind(log.attempt)
    .bind(log.http_status_code)
    .execute(pool)
    .await?;

    Ok(())
}
