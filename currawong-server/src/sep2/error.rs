use serde::{Deserialize, Serialize};

/// sep2 Error reason codes surfaced by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    InvalidRequestFormat,
    ResourceLimitReached,
    InternalError,
}

impl ReasonCode {
    fn as_i32(self) -> i32 {
        match self {
            ReasonCode::InvalidRequestFormat => 0,
            ReasonCode::ResourceLimitReached => 2,
            ReasonCode::InternalError => 3,
        }
    }

    fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(ReasonCode::InvalidRequestFormat),
            2 => Some(ReasonCode::ResourceLimitReached),
            3 => Some(ReasonCode::InternalError),
            _ => None,
        }
    }
}

impl Serialize for ReasonCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for ReasonCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i32::deserialize(deserializer)?;
        ReasonCode::from_i32(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown reasonCode {value}")))
    }
}

/// sep2 `<Error>` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Error")]
pub struct ErrorResponse {
    #[serde(rename = "@xmlns", default = "super::sep2_ns")]
    pub xmlns: String,
    #[serde(rename = "reasonCode")]
    pub reason_code: ReasonCode,
}

impl ErrorResponse {
    pub fn new(reason_code: ReasonCode) -> Self {
        Self {
            xmlns: super::sep2_ns(),
            reason_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_serializes_with_namespace_and_code() {
        let xml = quick_xml::se::to_string(&ErrorResponse::new(ReasonCode::ResourceLimitReached))
            .expect("serializes");
        assert_eq!(
            xml,
            r#"<Error xmlns="urn:ieee:std:2030.5:ns"><reasonCode>2</reasonCode></Error>"#
        );
    }
}
