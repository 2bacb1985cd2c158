//! Notification delivery: the `check_db_upsert` worker that turns one
//! changed instant into notifications, and the `transmit_notification`
//! worker that POSTs them with a fixed retry ladder.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use notify_broker::{DynBroker, TaskEnvelope, TaskHandler};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::ConfHandle;
use crate::mapper::MapperContext;
use crate::model::TransmitNotificationLog;
use crate::notify::batch::{batch_entities, entity_matches_subscription, fetch_entities_by_changed_at};
use crate::notify::render::{render_notification, subscription_href};
use crate::notify::{CheckChangesKwargs, TASK_CHECK_DB_UPSERT, TASK_TRANSMIT_NOTIFICATION};
use crate::store;

pub const HEADER_NOTIFICATION_ID: &str = "x-envoy-notification-id";
pub const HEADER_SUBSCRIPTION_HREF: &str = "x-envoy-subscription-href";

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Seconds until the next attempt, indexed by the attempt that just failed.
pub const RETRY_DELAYS: [u32; 4] = [10, 100, 300, 1800];

/// Delay before re-attempting after a failure of `attempt`, or `None` when
/// the ladder is exhausted and the notification is dropped.
pub fn attempt_to_retry_delay(attempt: u32) -> Option<u32> {
    RETRY_DELAYS.get(attempt as usize).copied()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmitKwargs {
    pub remote_uri: String,
    pub content: String,
    pub subscription_href: String,
    pub subscription_id: i64,
    pub notification_id: String,
    pub attempt: u32,
}

/// Worker for `check_db_upsert`: finds what changed at the carried instant
/// and fans out `transmit_notification` envelopes.
pub struct CheckChangesHandler {
    pub pool: PgPool,
    pub broker: DynBroker,
    pub conf_handle: ConfHandle,
}

#[async_trait]
impl TaskHandler for CheckChangesHandler {
    fn name(&self) -> &'static str {
        TASK_CHECK_DB_UPSERT
    }

    #[allow(clippy::cast_sign_loss)]
    async fn run(&self, kwargs: serde_json::Value) -> anyhow::Result<()> {
        let kwargs: CheckChangesKwargs = serde_json::from_value(kwargs)?;
        let timestamp = kwargs
            .timestamp()
            .ok_or_else(|| anyhow::anyhow!("unrepresentable change timestamp"))?;

        let conf = self.conf_handle.get_conf();
        let runtime_config = store::runtime_config::fetch_runtime_config(&self.pool).await;
        let ctx = MapperContext {
            href_prefix: conf.href_prefix.clone(),
            iana_pen: conf.iana_pen,
            #[allow(clippy::cast_possible_truncation)]
            pow10: runtime_config.site_control_pow10_encoding as i16,
        };

        let mut conn = self.pool.acquire().await?;
        let entities = fetch_entities_by_changed_at(&mut conn, kwargs.resource, timestamp).await?;
        if entities.is_empty() {
            return Ok(());
        }

        let now = OffsetDateTime::now_utc();
        let mut notifications = 0usize;

        for (key, batch) in batch_entities(entities) {
            let subscriptions =
                store::subscription::select_subscriptions_for_resource(&mut conn, key.aggregator_id, kwargs.resource)
                    .await?;

            for (subscription, conditions) in &subscriptions {
                let matched: Vec<_> = batch
                    .iter()
                    .filter(|entity| entity_matches_subscription(subscription, conditions, entity))
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    continue;
                }

                // Deletions get their own notifications (status 4), and each
                // notification carries at most entity_limit entities.
                let limit = usize::try_from(subscription.entity_limit.max(1)).unwrap_or(1);
                let (deleted, live): (Vec<_>, Vec<_>) =
                    matched.into_iter().partition(|entity| entity.deleted());

                for chunk in live.chunks(limit).chain(deleted.chunks(limit)) {
                    let content = render_notification(&ctx, subscription, chunk, now)?;
                    let transmit = TransmitKwargs {
                        remote_uri: subscription.notification_uri.clone(),
                        content,
                        subscription_href: subscription_href(&ctx, subscription),
                        subscription_id: subscription.subscription_id,
                        notification_id: Uuid::new_v4().to_string(),
                        attempt: 0,
                    };
                    self.broker
                        .enqueue(TaskEnvelope::new(TASK_TRANSMIT_NOTIFICATION, &transmit)?)
                        .await?;
                    notifications += 1;
                }
            }
        }

        debug!(
            resource = ?kwargs.resource,
            %timestamp,
            notifications,
            "Change check fanned out"
        );

        Ok(())
    }
}

/// The outcome of one transmission attempt.
enum TransmitOutcome {
    Delivered(u16),
    /// 3xx/4xx: the recipient told us to stop.
    Terminal(u16),
    /// Network error or 5xx: worth retrying.
    Retry(i32),
}

async fn do_transmit(client: &reqwest::Client, kwargs: &TransmitKwargs) -> TransmitOutcome {
    let response = client
        .post(&kwargs.remote_uri)
        .header("content-type", crate::http::SEP2_CONTENT_TYPE)
        .header(HEADER_NOTIFICATION_ID, &kwargs.notification_id)
        .header(HEADER_SUBSCRIPTION_HREF, &kwargs.subscription_href)
        .body(kwargs.content.clone())
        .send()
        .await;

    match response {
        Err(error) => {
            warn!(
                %error,
                notification_id = %kwargs.notification_id,
                remote_uri = %kwargs.remote_uri,
                attempt = kwargs.attempt,
                "Notification transmission failed"
            );
            TransmitOutcome::Retry(-1)
        }
        Ok(response) => {
            let status = response.status().as_u16();
            match status {
                200..=299 => TransmitOutcome::Delivered(status),
                300..=499 => {
                    error!(
                        status,
                        notification_id = %kwargs.notification_id,
                        remote_uri = %kwargs.remote_uri,
                        attempt = kwargs.attempt,
                        "Notification rejected; no future retries"
                    );
                    TransmitOutcome::Terminal(status)
                }
                _ => TransmitOutcome::Retry(i32::from(status)),
            }
        }
    }
}

/// Worker for `transmit_notification`.
pub struct TransmitHandler {
    pub pool: PgPool,
    pub broker: DynBroker,
    client: reqwest::Client,
}

impl TransmitHandler {
    pub fn new(pool: PgPool, broker: DynBroker) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { pool, broker, client })
    }

    async fn log_attempt(&self, kwargs: &TransmitKwargs, started: Instant, transmit_time: OffsetDateTime, status: i32) {
        let log = TransmitNotificationLog {
            transmit_notification_log_id: 0,
            subscription_id_snapshot: kwargs.subscription_id,
            transmit_time,
            transmit_duration_ms: i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX),
            notification_size_bytes: i32::try_from(kwargs.content.len()).unwrap_or(i32::MAX),
            attempt: i32::try_from(kwargs.attempt).unwrap_or(i32::MAX),
            http_status_code: status,
        };

        if let Err(error) = store::subscription::insert_transmit_log(&self.pool, &log).await {
            warn!(%error, "Failed to record transmit log entry");
        }
    }

    async fn schedule_retry(&self, kwargs: &TransmitKwargs) {
        let Some(delay) = attempt_to_retry_delay(kwargs.attempt) else {
            error!(
                notification_id = %kwargs.notification_id,
                remote_uri = %kwargs.remote_uri,
                "Dropping notification; too many failed attempts"
            );
            return;
        };

        let retry = TransmitKwargs {
            attempt: kwargs.attempt + 1,
            ..kwargs.clone()
        };

        let envelope = match TaskEnvelope::new(TASK_TRANSMIT_NOTIFICATION, &retry) {
            Ok(envelope) => envelope.with_delay(delay),
            Err(error) => {
                error!(%error, "Failed to encode retry envelope");
                return;
            }
        };

        if let Err(error) = self.broker.enqueue(envelope).await {
            error!(
                error = format!("{error:#}"),
                notification_id = %retry.notification_id,
                attempt = retry.attempt,
                "Failed to enqueue notification retry"
            );
        }
    }
}

#[async_trait]
impl TaskHandler for TransmitHandler {
    fn name(&self) -> &'static str {
        TASK_TRANSMIT_NOTIFICATION
    }

    async fn run(&self, kwargs: serde_json::Value) -> anyhow::Result<()> {
        let kwargs: TransmitKwargs = serde_json::from_value(kwargs)?;

        debug!(
            notification_id = %kwargs.notification_id,
            remote_uri = %kwargs.remote_uri,
            size = kwargs.content.len(),
            attempt = kwargs.attempt,
            "Transmitting notification"
        );

        let transmit_time = OffsetDateTime::now_utc();
        let started = Instant::now();
        let outcome = do_transmit(&self.client, &kwargs).await;

        match outcome {
            TransmitOutcome::Delivered(status) => {
                self.log_attempt(&kwargs, started, transmit_time, i32::from(status)).await;
            }
            TransmitOutcome::Terminal(status) => {
                self.log_attempt(&kwargs, started, transmit_time, i32::from(status)).await;
            }
            TransmitOutcome::Retry(status) => {
                self.log_attempt(&kwargs, started, transmit_time, status).await;
                self.schedule_retry(&kwargs).await;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_ladder_matches_spec() {
        assert_eq!(attempt_to_retry_delay(0), Some(10));
        assert_eq!(attempt_to_retry_delay(1), Some(100));
        assert_eq!(attempt_to_retry_delay(2), Some(300));
        assert_eq!(attempt_to_retry_delay(3), Some(1800));
        assert_eq!(attempt_to_retry_delay(4), None);
    }

    #[test]
    fn failing_attempts_walk_the_whole_ladder_then_drop() {
        let mut attempt = 0;
        let mut delays = Vec::new();
        while let Some(delay) = attempt_to_retry_delay(attempt) {
            delays.push(delay);
            attempt += 1;
        }
        assert_eq!(delays, RETRY_DELAYS);
        assert_eq!(attempt, 4);
    }
}
