use time::OffsetDateTime;

/// A client-posted diagnostic log entry for a site.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SiteLogEvent {
    pub site_log_event_id: i64,
    pub site_id: i64,
    /// sep2 function set the event originated from.
    pub function_set: i32,
    pub log_event_code: i32,
    /// PEN of the organisation defining `log_event_code`.
    pub log_event_pen: i32,
    pub profile_id: i32,
    pub details: Option<String>,
    pub created_time: OffsetDateTime,
}
