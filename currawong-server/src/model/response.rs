use time::OffsetDateTime;

use crate::mrid::PricingReadingType;

/// sep2 ResponseType status codes (Table 27 of IEEE Std 2030.5-2018).
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum ResponseType {
    EventReceived = 1,
    EventStarted = 2,
    EventCompleted = 3,
    EventOptOut = 4,
    EventOptIn = 5,
    EventCancelled = 6,
    EventSuperseded = 7,
    EventPartialOptOut = 8,
    EventPartialOptIn = 9,
    EventCompletedNoUserParticipation = 10,
    EventAcknowledged = 11,
    EventNoDisplay = 12,
    EventAbortedServer = 13,
    EventAbortedProgram = 14,
    RejectedInvalidEvent = 252,
    RejectedEventExpired = 253,
    RejectedUnretrievableEvent = 254,
    RejectedCommandUnsupported = 255,
}

impl ResponseType {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(ResponseType::EventReceived),
            2 => Some(ResponseType::EventStarted),
            3 => Some(ResponseType::EventCompleted),
            4 => Some(ResponseType::EventOptOut),
            5 => Some(ResponseType::EventOptIn),
            6 => Some(ResponseType::EventCancelled),
            7 => Some(ResponseType::EventSuperseded),
            8 => Some(ResponseType::EventPartialOptOut),
            9 => Some(ResponseType::EventPartialOptIn),
            10 => Some(ResponseType::EventCompletedNoUserParticipation),
            11 => Some(ResponseType::EventAcknowledged),
            12 => Some(ResponseType::EventNoDisplay),
            13 => Some(ResponseType::EventAbortedServer),
            14 => Some(ResponseType::EventAbortedProgram),
            252 => Some(ResponseType::RejectedInvalidEvent),
            253 => Some(ResponseType::RejectedEventExpired),
            254 => Some(ResponseType::RejectedUnretrievableEvent),
            255 => Some(ResponseType::RejectedCommandUnsupported),
            _ => None,
        }
    }
}

/// A client acknowledgement of a dynamic operating envelope.
///
/// The snapshot columns are immutable: they refer to a moment-in-time row
/// that may since have been archived. Responses themselves are never
/// archived.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DoeResponse {
    pub doe_response_id: i64,
    pub dynamic_operating_envelope_id_snapshot: i64,
    pub site_id: i64,
    pub response_type: ResponseType,
    pub created_time: OffsetDateTime,
}

/// A client acknowledgement of a tariff generated rate (for one pricing
/// reading flavour).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RateResponse {
    pub rate_response_id: i64,
    pub tariff_generated_rate_id_snapshot: i64,
    pub site_id: i64,
    pub pricing_reading_type: PricingReadingType,
    pub response_type: ResponseType,
    pub created_time: OffsetDateTime,
}
