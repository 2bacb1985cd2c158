//! National Metering Identifier (connection point id) validation.

/// Characters never allocated in an NMI (visually ambiguous).
fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() && !matches!(c.to_ascii_uppercase(), 'I' | 'O')
}

/// AEMO checksum over the 10 identifying characters: ASCII values, every
/// second character (rightmost first) doubled, digit-summed, mod-10
/// complement.
pub fn nmi_checksum(nmi: &str) -> Option<u32> {
    if nmi.len() < 10 {
        return None;
    }

    let mut digit_sum = 0;
    for (idx, ch) in nmi[..10].chars().rev().enumerate() {
        let mut value = ch.to_ascii_uppercase() as u32;
        if idx % 2 == 0 {
            value *= 2;
        }
        while value > 0 {
            digit_sum += value % 10;
            value /= 10;
        }
    }

    Some((10 - digit_sum % 10) % 10)
}

/// Validates an NMI: 10 or 11 allowed characters, and when the 11th
/// (checksum) character is present it must verify. An optional participant
/// prefix restricts which allocation range is accepted.
pub fn is_valid_nmi(nmi: &str, participant_prefix: Option<&str>) -> bool {
    if !(nmi.len() == 10 || nmi.len() == 11) || !nmi.chars().all(is_allowed_char) {
        return false;
    }

    if let Some(prefix) = participant_prefix {
        if !nmi.to_ascii_uppercase().starts_with(&prefix.to_ascii_uppercase()) {
            return false;
        }
    }

    if nmi.len() == 11 {
        let Some(expected) = nmi_checksum(nmi) else {
            return false;
        };
        let actual = nmi.chars().nth(10).and_then(|c| c.to_digit(10));
        return actual == Some(expected);
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    // Checksum examples published by AEMO.
    #[rstest]
    #[case("2001985732", 8)]
    #[case("QAAAVZZZZZ", 3)]
    fn checksum_vectors(#[case] nmi: &str, #[case] expected: u32) {
        assert_eq!(nmi_checksum(nmi), Some(expected));
    }

    #[rstest]
    #[case("2001985732", true)]
    #[case("20019857328", true)] // with valid checksum digit
    #[case("20019857327", false)] // wrong checksum digit
    #[case("2001985I32", false)] // disallowed character
    #[case("200198573", false)] // too short
    #[case("200198573288", false)] // too long
    fn format_validation(#[case] nmi: &str, #[case] valid: bool) {
        assert_eq!(is_valid_nmi(nmi, None), valid);
    }

    #[test]
    fn participant_prefix_is_enforced() {
        assert!(is_valid_nmi("2001985732", Some("2")));
        assert!(!is_valid_nmi("2001985732", Some("Q")));
    }
}
