//! sep2 MRID encoding.
//!
//! An MRID is a 128-bit globally unique resource identifier rendered as 32
//! hex chars. This server multiplexes it, most-significant bits first:
//!
//! ```text
//! | 4 bits: MridType | 32 bits: IANA PEN | 92 bits: payload |
//! ```
//!
//! The payload layout is dictated by the type tag. Encoding is deterministic
//! and reversible so a client's asynchronous Response can be correlated back
//! to the originating control entity.

use serde::{Deserialize, Serialize};

const MRID_HEX_CHARS: usize = 32;
const PAYLOAD_BITS: u32 = 92;
const PEN_SHIFT: u32 = PAYLOAD_BITS;
const TYPE_SHIFT: u32 = PAYLOAD_BITS + 32;
const PAYLOAD_MASK: u128 = (1 << PAYLOAD_BITS) - 1;

// Sub-splits of the 92-bit payload for composite keys.
const PRICING_READING_BITS: u32 = 4;
const RATE_COMPONENT_ID_BITS: u32 = 44;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MridType {
    DefaultDoe = 1,
    DerProgram = 2,
    DynamicOperatingEnvelope = 3,
    FunctionSetAssignment = 4,
    Tariff = 7,
    RateComponent = 8,
    TimeTariffInterval = 9,
    ResponseSet = 10,
}

impl MridType {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(MridType::DefaultDoe),
            2 => Some(MridType::DerProgram),
            3 => Some(MridType::DynamicOperatingEnvelope),
            4 => Some(MridType::FunctionSetAssignment),
            7 => Some(MridType::Tariff),
            8 => Some(MridType::RateComponent),
            9 => Some(MridType::TimeTariffInterval),
            10 => Some(MridType::ResponseSet),
            _ => None,
        }
    }
}

/// The reading flavours that can be priced. At most 4 bits worth of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum PricingReadingType {
    ImportActivePowerKwh = 1,
    ExportActivePowerKwh = 2,
    ImportReactivePowerKvarh = 3,
    ExportReactivePowerKvarh = 4,
}

impl PricingReadingType {
    pub const ALL: [PricingReadingType; 4] = [
        PricingReadingType::ImportActivePowerKwh,
        PricingReadingType::ExportActivePowerKwh,
        PricingReadingType::ImportReactivePowerKvarh,
        PricingReadingType::ExportReactivePowerKvarh,
    ];

    fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(PricingReadingType::ImportActivePowerKwh),
            2 => Some(PricingReadingType::ExportActivePowerKwh),
            3 => Some(PricingReadingType::ImportReactivePowerKvarh),
            4 => Some(PricingReadingType::ExportReactivePowerKvarh),
            _ => None,
        }
    }
}

/// Every entity flavour that accepts client Responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResponseSetType {
    TariffGeneratedRates = 1,
    DynamicOperatingEnvelopes = 2,
}

impl ResponseSetType {
    pub const ALL: [ResponseSetType; 2] = [
        ResponseSetType::TariffGeneratedRates,
        ResponseSetType::DynamicOperatingEnvelopes,
    ];

    /// URI slug for the response-set list (`/rsps/{slug}`).
    pub fn slug(self) -> &'static str {
        match self {
            ResponseSetType::TariffGeneratedRates => "price",
            ResponseSetType::DynamicOperatingEnvelopes => "doe",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "price" => Some(ResponseSetType::TariffGeneratedRates),
            "doe" => Some(ResponseSetType::DynamicOperatingEnvelopes),
            _ => None,
        }
    }

    fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(ResponseSetType::TariffGeneratedRates),
            2 => Some(ResponseSetType::DynamicOperatingEnvelopes),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MridError {
    #[error("'{0}' is not a 32 char hex MRID")]
    Malformed(String),
    #[error("MRID carries unknown type tag {0}")]
    UnknownType(u8),
    #[error("MRID PEN {actual} doesn't match this server's PEN {expected}")]
    ForeignPen { expected: u32, actual: u32 },
    #[error("expected a {expected:?} MRID but found {actual:?}")]
    TypeMismatch { expected: MridType, actual: MridType },
    #[error("MRID payload doesn't decode for {0:?}")]
    BadPayload(MridType),
}

fn encode(mrid_type: MridType, iana_pen: u32, payload: u128) -> String {
    debug_assert!(payload <= PAYLOAD_MASK);
    let raw = (u128::from(mrid_type as u8) << TYPE_SHIFT)
        | (u128::from(iana_pen) << PEN_SHIFT)
        | (payload & PAYLOAD_MASK);
    format!("{raw:032x}")
}

fn decode_raw(mrid: &str) -> Result<(u8, u32, u128), MridError> {
    if mrid.len() != MRID_HEX_CHARS {
        return Err(MridError::Malformed(mrid.to_owned()));
    }
    let raw = u128::from_str_radix(mrid, 16).map_err(|_| MridError::Malformed(mrid.to_owned()))?;

    #[allow(clippy::cast_possible_truncation)]
    let tag = (raw >> TYPE_SHIFT) as u8;
    #[allow(clippy::cast_possible_truncation)]
    let pen = ((raw >> PEN_SHIFT) & u128::from(u32::MAX)) as u32;

    Ok((tag, pen, raw & PAYLOAD_MASK))
}

/// Decodes an MRID far enough to know what it refers to, rejecting MRIDs
/// minted under a different PEN. Case-insensitive.
pub fn decode_and_validate_mrid_type(iana_pen: u32, mrid: &str) -> Result<MridType, MridError> {
    let (tag, pen, _) = decode_raw(&mrid.to_lowercase())?;

    let mrid_type = MridType::from_tag(tag).ok_or(MridError::UnknownType(tag))?;

    if pen != iana_pen {
        return Err(MridError::ForeignPen {
            expected: iana_pen,
            actual: pen,
        });
    }

    Ok(mrid_type)
}

fn decode_payload(expected: MridType, mrid: &str) -> Result<u128, MridError> {
    let (tag, _, payload) = decode_raw(&mrid.to_lowercase())?;
    let actual = MridType::from_tag(tag).ok_or(MridError::UnknownType(tag))?;
    if actual != expected {
        return Err(MridError::TypeMismatch { expected, actual });
    }
    Ok(payload)
}

fn id_from_payload(mrid_type: MridType, payload: u128) -> Result<i64, MridError> {
    i64::try_from(payload).map_err(|_| MridError::BadPayload(mrid_type))
}

pub fn encode_default_doe_mrid(iana_pen: u32, site_id: i64) -> String {
    encode(MridType::DefaultDoe, iana_pen, site_id.unsigned_abs().into())
}

pub fn encode_der_program_mrid(iana_pen: u32, site_id: i64) -> String {
    encode(MridType::DerProgram, iana_pen, site_id.unsigned_abs().into())
}

pub fn encode_doe_mrid(iana_pen: u32, doe_id: i64) -> String {
    encode(
        MridType::DynamicOperatingEnvelope,
        iana_pen,
        doe_id.unsigned_abs().into(),
    )
}

pub fn decode_doe_mrid(mrid: &str) -> Result<i64, MridError> {
    let payload = decode_payload(MridType::DynamicOperatingEnvelope, mrid)?;
    id_from_payload(MridType::DynamicOperatingEnvelope, payload)
}

pub fn encode_function_set_assignment_mrid(iana_pen: u32, site_id: i64, fsa_id: i64) -> String {
    let payload = (u128::from(site_id.unsigned_abs()) << 46) | u128::from(fsa_id.unsigned_abs());
    encode(MridType::FunctionSetAssignment, iana_pen, payload)
}

pub fn decode_function_set_assignment_mrid(mrid: &str) -> Result<(i64, i64), MridError> {
    let payload = decode_payload(MridType::FunctionSetAssignment, mrid)?;
    let site_id = id_from_payload(MridType::FunctionSetAssignment, payload >> 46)?;
    let fsa_id = id_from_payload(MridType::FunctionSetAssignment, payload & ((1 << 46) - 1))?;
    Ok((site_id, fsa_id))
}

pub fn encode_tariff_mrid(iana_pen: u32, tariff_id: i64) -> String {
    encode(MridType::Tariff, iana_pen, tariff_id.unsigned_abs().into())
}

pub fn decode_tariff_mrid(mrid: &str) -> Result<i64, MridError> {
    let payload = decode_payload(MridType::Tariff, mrid)?;
    id_from_payload(MridType::Tariff, payload)
}

pub fn encode_rate_component_mrid(
    iana_pen: u32,
    tariff_id: i64,
    site_id: i64,
    pricing_reading: PricingReadingType,
) -> String {
    let payload = (u128::from(tariff_id.unsigned_abs()) << (RATE_COMPONENT_ID_BITS + PRICING_READING_BITS))
        | (u128::from(site_id.unsigned_abs()) << PRICING_READING_BITS)
        | u128::from(pricing_reading as u8);
    encode(MridType::RateComponent, iana_pen, payload)
}

pub fn decode_rate_component_mrid(mrid: &str) -> Result<(i64, i64, PricingReadingType), MridError> {
    let payload = decode_payload(MridType::RateComponent, mrid)?;

    #[allow(clippy::cast_possible_truncation)]
    let pricing_reading = PricingReadingType::from_value((payload & 0xf) as u8)
        .ok_or(MridError::BadPayload(MridType::RateComponent))?;
    let site_id = id_from_payload(
        MridType::RateComponent,
        (payload >> PRICING_READING_BITS) & ((1 << RATE_COMPONENT_ID_BITS) - 1),
    )?;
    let tariff_id = id_from_payload(
        MridType::RateComponent,
        payload >> (RATE_COMPONENT_ID_BITS + PRICING_READING_BITS),
    )?;

    Ok((tariff_id, site_id, pricing_reading))
}

pub fn encode_time_tariff_interval_mrid(
    iana_pen: u32,
    rate_id: i64,
    pricing_reading: PricingReadingType,
) -> String {
    let payload = (u128::from(rate_id.unsigned_abs()) << PRICING_READING_BITS)
        | u128::from(pricing_reading as u8);
    encode(MridType::TimeTariffInterval, iana_pen, payload)
}

pub fn decode_time_tariff_interval_mrid(mrid: &str) -> Result<(i64, PricingReadingType), MridError> {
    let payload = decode_payload(MridType::TimeTariffInterval, mrid)?;

    #[allow(clippy::cast_possible_truncation)]
    let pricing_reading = PricingReadingType::from_value((payload & 0xf) as u8)
        .ok_or(MridError::BadPayload(MridType::TimeTariffInterval))?;
    let rate_id = id_from_payload(MridType::TimeTariffInterval, payload >> PRICING_READING_BITS)?;

    Ok((rate_id, pricing_reading))
}

pub fn encode_response_set_mrid(iana_pen: u32, response_set: ResponseSetType) -> String {
    encode(MridType::ResponseSet, iana_pen, u128::from(response_set as u8))
}

pub fn decode_response_set_mrid(mrid: &str) -> Result<ResponseSetType, MridError> {
    let payload = decode_payload(MridType::ResponseSet, mrid)?;

    #[allow(clippy::cast_possible_truncation)]
    ResponseSetType::from_value((payload & 0xff) as u8).ok_or(MridError::BadPayload(MridType::ResponseSet))
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    const PEN: u32 = 40414;

    #[test]
    fn mrids_are_32_hex_chars_with_embedded_type_and_pen() {
        let mrid = encode_doe_mrid(PEN, 42);
        assert_eq!(mrid.len(), 32);
        assert_eq!(
            decode_and_validate_mrid_type(PEN, &mrid),
            Ok(MridType::DynamicOperatingEnvelope)
        );
        assert_eq!(decode_doe_mrid(&mrid), Ok(42));
    }

    #[test]
    fn decoding_is_case_insensitive() {
        let mrid = encode_doe_mrid(PEN, 42).to_uppercase();
        assert_eq!(decode_doe_mrid(&mrid), Ok(42));
    }

    #[test]
    fn foreign_pen_is_rejected() {
        let mrid = encode_doe_mrid(PEN, 42);
        assert_eq!(
            decode_and_validate_mrid_type(PEN + 1, &mrid),
            Err(MridError::ForeignPen {
                expected: PEN + 1,
                actual: PEN
            })
        );
    }

    #[test]
    fn decode_helpers_reject_other_tags() {
        let mrid = encode_tariff_mrid(PEN, 1);
        assert_eq!(
            decode_doe_mrid(&mrid),
            Err(MridError::TypeMismatch {
                expected: MridType::DynamicOperatingEnvelope,
                actual: MridType::Tariff,
            })
        );
    }

    #[test]
    fn malformed_mrids_are_rejected() {
        assert!(matches!(
            decode_and_validate_mrid_type(PEN, "zz"),
            Err(MridError::Malformed(_))
        ));
        assert!(matches!(
            decode_and_validate_mrid_type(PEN, &"g".repeat(32)),
            Err(MridError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        // Tag 15 is unassigned.
        let raw = (15u128 << TYPE_SHIFT) | (u128::from(PEN) << PEN_SHIFT);
        assert_eq!(
            decode_and_validate_mrid_type(PEN, &format!("{raw:032x}")),
            Err(MridError::UnknownType(15))
        );
    }

    proptest! {
        #[test]
        fn doe_roundtrip(doe_id in 0i64..=i64::MAX, pen in 0u32..=u32::MAX) {
            let mrid = encode_doe_mrid(pen, doe_id);
            prop_assert_eq!(decode_and_validate_mrid_type(pen, &mrid), Ok(MridType::DynamicOperatingEnvelope));
            prop_assert_eq!(decode_doe_mrid(&mrid), Ok(doe_id));
        }

        #[test]
        fn tariff_roundtrip(tariff_id in 0i64..=i64::MAX) {
            prop_assert_eq!(decode_tariff_mrid(&encode_tariff_mrid(PEN, tariff_id)), Ok(tariff_id));
        }

        #[test]
        fn fsa_roundtrip(site_id in 0i64..(1i64 << 46), fsa_id in 0i64..(1i64 << 46)) {
            let mrid = encode_function_set_assignment_mrid(PEN, site_id, fsa_id);
            prop_assert_eq!(decode_function_set_assignment_mrid(&mrid), Ok((site_id, fsa_id)));
        }

        #[test]
        fn rate_component_roundtrip(
            tariff_id in 0i64..(1i64 << 44),
            site_id in 0i64..(1i64 << 44),
            prt_idx in 0usize..4,
        ) {
            let prt = PricingReadingType::ALL[prt_idx];
            let mrid = encode_rate_component_mrid(PEN, tariff_id, site_id, prt);
            prop_assert_eq!(decode_rate_component_mrid(&mrid), Ok((tariff_id, site_id, prt)));
        }

        #[test]
        fn time_tariff_interval_roundtrip(rate_id in 0i64..=i64::MAX, prt_idx in 0usize..4) {
            let prt = PricingReadingType::ALL[prt_idx];
            let mrid = encode_time_tariff_interval_mrid(PEN, rate_id, prt);
            prop_assert_eq!(decode_time_tariff_interval_mrid(&mrid), Ok((rate_id, prt)));
        }

        #[test]
        fn response_set_roundtrip(idx in 0usize..2) {
            let rst = ResponseSetType::ALL[idx];
            let mrid = encode_response_set_mrid(PEN, rst);
            prop_assert_eq!(decode_response_set_mrid(&mrid), Ok(rst));
        }
    }
}
