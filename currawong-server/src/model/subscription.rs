use time::OffsetDateTime;

/// The resource flavours a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum SubscriptionResource {
    Site = 1,
    DynamicOperatingEnvelope = 2,
    TariffGeneratedRate = 3,
    Reading = 4,
    DefaultSiteControl = 5,
}

impl SubscriptionResource {
    pub const ALL: [SubscriptionResource; 5] = [
        SubscriptionResource::Site,
        SubscriptionResource::DynamicOperatingEnvelope,
        SubscriptionResource::TariffGeneratedRate,
        SubscriptionResource::Reading,
        SubscriptionResource::DefaultSiteControl,
    ];
}

/// The attribute a [`SubscriptionCondition`] ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum ConditionAttribute {
    ReadingValue = 0,
}

/// A remote client wanting webhook notifications as resources change.
/// `scoped_site_id` of NULL means "all sites of this aggregator".
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Subscription {
    pub subscription_id: i64,
    pub aggregator_id: i64,
    pub resource_type: SubscriptionResource,
    /// A single resource id to watch, or NULL for the whole list.
    pub resource_id: Option<i64>,
    pub scoped_site_id: Option<i64>,
    pub notification_uri: String,
    pub entity_limit: i32,
    pub created_time: OffsetDateTime,
    pub changed_time: OffsetDateTime,
}

/// Narrows a subscription to a closed value range on one attribute. When a
/// subscription has several conditions they must all hold.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SubscriptionCondition {
    pub subscription_condition_id: i64,
    pub subscription_id: i64,
    pub attribute: ConditionAttribute,
    pub lower_threshold: i64,
    pub upper_threshold: i64,
}

impl SubscriptionCondition {
    pub fn matches(&self, value: i64) -> bool {
        self.lower_threshold <= value && value <= self.upper_threshold
    }
}

/// One attempt to transmit a notification. Heavily written; optimised for
/// storage size.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransmitNotificationLog {
    pub transmit_notification_log_id: i64,
    /// Snapshot of the subscription id at transmit time; consult the
    /// subscription archive for values around `transmit_time`.
    pub subscription_id_snapshot: i64,
    pub transmit_time: OffsetDateTime,
    pub transmit_duration_ms: i32,
    pub notification_size_bytes: i32,
    pub attempt: i32,
    /// HTTP status received, or -1 when transmission itself failed.
    pub http_status_code: i32,
}
