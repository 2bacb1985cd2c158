//! The pub/sub notification engine.
//!
//! Request handlers never talk to subscribers directly: after committing a
//! change they enqueue a `check_db_upsert` task carrying the resource type
//! and the exact `changed_time` they wrote. A worker picks that up, finds
//! everything stamped with that instant, matches subscriptions, and enqueues
//! one `transmit_notification` per (subscription, batch) chunk.

pub mod batch;
pub mod render;
pub mod transmit;

use notify_broker::{DynBroker, TaskEnvelope};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::model::SubscriptionResource;

pub const TASK_CHECK_DB_UPSERT: &str = "check_db_upsert";
pub const TASK_TRANSMIT_NOTIFICATION: &str = "transmit_notification";

/// Kwargs for `check_db_upsert`. The timestamp is carried at microsecond
/// precision so it compares equal to the stored `changed_time`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckChangesKwargs {
    pub resource: SubscriptionResource,
    pub timestamp_epoch_micros: i64,
}

impl CheckChangesKwargs {
    pub fn new(resource: SubscriptionResource, timestamp: OffsetDateTime) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self {
            resource,
            timestamp_epoch_micros: (timestamp.unix_timestamp_nanos() / 1_000) as i64,
        }
    }

    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.timestamp_epoch_micros) * 1_000).ok()
    }
}

/// Cloneable handle the request path uses to kick change detection.
/// Enqueueing is strictly post-commit and best-effort: a broker failure is
/// logged, never surfaced to the client (they poll as a backstop).
#[derive(Clone)]
pub struct NotificationHandle {
    broker: Option<DynBroker>,
}

impl NotificationHandle {
    pub fn new(broker: DynBroker) -> Self {
        Self { broker: Some(broker) }
    }

    pub fn disabled() -> Self {
        Self { broker: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.broker.is_some()
    }

    pub fn broker(&self) -> Option<&DynBroker> {
        self.broker.as_ref()
    }

    /// Call after commit with the exact `changed_time` written.
    pub async fn notify_changed(&self, resource: SubscriptionResource, timestamp: OffsetDateTime) -> bool {
        let Some(broker) = &self.broker else {
            return false;
        };

        let kwargs = CheckChangesKwargs::new(resource, timestamp);
        let envelope = match TaskEnvelope::new(TASK_CHECK_DB_UPSERT, &kwargs) {
            Ok(envelope) => envelope,
            Err(error) => {
                error!(%error, ?resource, "Failed to encode change-check task");
                return false;
            }
        };

        match broker.enqueue(envelope).await {
            Ok(()) => true,
            Err(error) => {
                error!(
                    error = format!("{error:#}"),
                    ?resource,
                    "Failed to enqueue change-check task"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::datetime;

    #[test]
    fn kwargs_timestamp_roundtrips_at_micros() {
        let timestamp = datetime!(2024-03-01 10:30:00.123456 UTC);
        let kwargs = CheckChangesKwargs::new(SubscriptionResource::Site, timestamp);
        assert_eq!(kwargs.timestamp(), Some(timestamp));

        let json = serde_json::to_string(&kwargs).expect("encodes");
        let decoded: CheckChangesKwargs = serde_json::from_str(&json).expect("decodes");
        assert_eq!(decoded.timestamp(), Some(timestamp));
    }

    #[tokio::test]
    async fn disabled_handle_reports_false() {
        let handle = NotificationHandle::disabled();
        assert!(!handle.notify_changed(SubscriptionResource::Site, OffsetDateTime::now_utc()).await);
    }
}
