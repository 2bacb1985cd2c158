use crate::http::ServiceError;
use crate::model::SiteLogEvent;
use crate::sep2::log_event::{LogEvent, LogEventList};
use crate::sep2::sep2_ns;

use super::MapperContext;

pub fn map_log_event(ctx: &MapperContext, event: &SiteLogEvent) -> LogEvent {
    LogEvent {
        xmlns: sep2_ns(),
        href: Some(ctx.href(&format!(
            "/edev/{}/log/{}",
            event.site_id, event.site_log_event_id
        ))),
        created_date_time: Some(event.created_time.unix_timestamp()),
        details: event.details.clone(),
        extended_data: None,
        function_set: event.function_set,
        log_event_code: event.log_event_code,
        log_event_id: event.site_log_event_id,
        log_event_pen: event.log_event_pen,
        profile_id: event.profile_id,
    }
}

pub fn map_log_event_list(
    ctx: &MapperContext,
    site_id: i64,
    events: &[SiteLogEvent],
    total: i64,
) -> LogEventList {
    LogEventList {
        xmlns: sep2_ns(),
        href: ctx.href(&format!("/edev/{site_id}/log")),
        all: total,
        results: i64::try_from(events.len()).unwrap_or(i64::MAX),
        log_events: events.iter().map(|event| map_log_event(ctx, event)).collect(),
    }
}

/// Validates a client-posted LogEvent into its storable form. The wire
/// `logEventID` is client-assigned noise; the DB key replaces it.
pub fn log_event_from_request(site_id: i64, request: &LogEvent) -> Result<SiteLogEvent, ServiceError> {
    if let Some(details) = &request.details {
        if details.len() > 32 {
            return Err(ServiceError::bad_request("LogEvent details must be 32 chars or fewer"));
        }
    }

    Ok(SiteLogEvent {
        site_log_event_id: 0,
        site_id,
        function_set: request.function_set,
        log_event_code: request.log_event_code,
        log_event_pen: request.log_event_pen,
        profile_id: request.profile_id,
        details: request.details.clone(),
        created_time: time::OffsetDateTime::UNIX_EPOCH,
    })
}
