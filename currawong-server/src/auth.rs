//! Client identity derivation from forwarded TLS material.
//!
//! The front proxy terminates TLS and forwards either the full client
//! certificate PEM or its SHA-256 fingerprint in a configurable header; both
//! collapse to the sep2 LFDI (IEEE Std 2030.5-2018 §6.3.4).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use expiring_cache::{ExpiringCache, ExpiringValue, UpdateFn};
use percent_encoding::percent_decode_str;
use sha2::{Digest as _, Sha256};
use sqlx::PgPool;

use crate::store;

pub const LFDI_HEX_CHARS: usize = 40;

/// Identity material resolved from the certificate store for one LFDI.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ClientIdDetails {
    pub certificate_id: i64,
    pub lfdi: String,
    pub aggregator_id: i64,
    pub expiry: time::OffsetDateTime,
}

/// LFDI → certificate details, refreshed wholesale from the certificate and
/// assignment tables. Expired certificates stay present so requests bearing
/// them can be rejected rather than treated as device certs.
pub type CertificateCache = ExpiringCache<PgPool, String, ClientIdDetails>;

pub fn new_certificate_cache() -> Arc<CertificateCache> {
    let update_fn: UpdateFn<PgPool, String, ClientIdDetails> = Arc::new(|pool| {
        Box::pin(async move {
            let client_ids = store::auth::select_all_client_id_details(&pool)
                .await
                .context("refresh certificate cache")?;

            Ok(client_ids
                .into_iter()
                .map(|cid| (cid.lfdi.clone(), ExpiringValue::new(Some(cid.expiry), cid)))
                .collect::<HashMap<_, _>>())
        })
    });

    Arc::new(ExpiringCache::new(update_fn))
}

/// Derives the LFDI from a PEM-armored certificate: base64-decode the body,
/// SHA-256 the DER bytes, left-truncate to 160 bits, lowercase hex.
pub fn lfdi_from_pem(cert_pem: &str) -> anyhow::Result<String> {
    let decoded = percent_decode_str(cert_pem)
        .decode_utf8()
        .context("percent-decode certificate PEM")?;

    let mut lines = decoded.lines().collect::<Vec<_>>();
    if lines.len() < 3 {
        anyhow::bail!("certificate PEM is too short");
    }
    // Strip the BEGIN/END armor lines.
    lines.remove(0);
    lines.pop();

    let der = BASE64_STANDARD
        .decode(lines.concat())
        .context("base64-decode certificate body")?;

    let fingerprint = hex::encode(Sha256::digest(&der));
    Ok(lfdi_from_fingerprint(&fingerprint))
}

/// Derives the LFDI from a certificate fingerprint by left-truncating to
/// 160 bits (40 hex chars).
pub fn lfdi_from_fingerprint(fingerprint: &str) -> String {
    let decoded = percent_decode_str(fingerprint)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| fingerprint.to_owned());
    decoded.chars().take(LFDI_HEX_CHARS).collect::<String>().to_lowercase()
}

/// Derives the SFDI: the leading 36 bits of the LFDI rendered in decimal with
/// a check digit appended so that the sum of all digits is a multiple of 10.
pub fn sfdi_from_lfdi(lfdi: &str) -> anyhow::Result<u64> {
    if lfdi.len() < 10 {
        anyhow::bail!("LFDI '{lfdi}' is too short to derive an SFDI");
    }

    let bits_36 = u64::from_str_radix(&lfdi[..9], 16)
        .with_context(|| format!("LFDI '{lfdi}' is not hex"))?;

    let mut digit_sum = 0;
    let mut remaining = bits_36;
    while remaining > 0 {
        digit_sum += remaining % 10;
        remaining /= 10;
    }
    let check_digit = (10 - digit_sum % 10) % 10;

    Ok(bits_36 * 10 + check_digit)
}

/// Resolves the header payload to an LFDI; PEM input is detected by its armor.
pub fn lfdi_from_header_value(value: &str) -> anyhow::Result<String> {
    let trimmed = value.trim();
    if trimmed.starts_with("-----BEGIN") || trimmed.starts_with("-----%20BEGIN") {
        lfdi_from_pem(trimmed)
    } else {
        let lfdi = lfdi_from_fingerprint(trimmed);
        anyhow::ensure!(
            lfdi.len() == LFDI_HEX_CHARS && lfdi.chars().all(|c| c.is_ascii_hexdigit()),
            "certificate fingerprint is not {LFDI_HEX_CHARS} hex chars"
        );
        Ok(lfdi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    // Self-signed test certificate; only the DER bytes matter here.
    const TEST_PEM: &str = "-----BEGIN CERTIFICATE-----\n\
MIIBhTCCASugAwIBAgIQIRi6zePL6mKjOipn+dNuaTAKBggqhkjOPQQDAjASMRAw\n\
DgYDVQQKEwdBY21lIENvMB4XDTE3MTAyMDE5NDMwNloXDTE4MTAyMDE5NDMwNlow\n\
EjEQMA4GA1UEChMHQWNtZSBDbzBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABD0d\n\
7VNhbWvZLWPuj/RtHFjvtJBEwOkhbN/BnnE8rnZR8+sbwnc/KhCk3FhnpHZnQz7B\n\
5aETbbIgmuvewdjvSBSjYzBhMA4GA1UdDwEB/wQEAwICpDATBgNVHSUEDDAKBggr\n\
BgEFBQcDATAPBgNVHRMBAf8EBTADAQH/MCkGA1UdEQQiMCCCDmxvY2FsaG9zdDo1\n\
NDUzgg4xMjcuMC4wLjE6NTQ1MzAKBggqhkjOPQQDAgNIADBFAiEA2zpJEPQyz6/l\n\
Wf86aX6PepsntZv2GYlA5UpabfT2EZICICpJ5h/iI+i341gBmLiAFQOyTDT+/wQc\n\
6MF9+Yw1Yy0t\n\
-----END CERTIFICATE-----";

    #[test]
    fn lfdi_from_pem_is_40_lowercase_hex() {
        let lfdi = lfdi_from_pem(TEST_PEM).expect("valid PEM");
        assert_eq!(lfdi.len(), LFDI_HEX_CHARS);
        assert!(lfdi.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn lfdi_from_pem_is_deterministic() {
        assert_eq!(
            lfdi_from_pem(TEST_PEM).expect("valid PEM"),
            lfdi_from_pem(TEST_PEM).expect("valid PEM"),
        );
    }

    #[test]
    fn lfdi_from_fingerprint_truncates_and_lowercases() {
        let fingerprint = "0x3E4F45AB31EDFE5B67E343E5E4562E31984E23E5".replace("0x", "")
            + "ffffffffffffffffffffffff";
        assert_eq!(
            lfdi_from_fingerprint(&fingerprint),
            "3e4f45ab31edfe5b67e343e5e4562e31984e23e5"
        );
    }

    #[rstest]
    #[case("3e4f45ab31edfe5b67e343e5e4562e31984e23e5", 167261211391)]
    #[case("0000000000", 0)]
    fn sfdi_vectors(#[case] lfdi: &str, #[case] expected: u64) {
        assert_eq!(sfdi_from_lfdi(lfdi).expect("valid LFDI"), expected);
    }

    #[test]
    fn sfdi_check_digit_makes_digit_sum_divisible_by_ten() {
        let sfdi = sfdi_from_lfdi("8000000000000000000000000000000000000000").expect("valid LFDI");
        let digit_sum: u64 = sfdi
            .to_string()
            .bytes()
            .map(|b| u64::from(b - b'0'))
            .sum();
        assert_eq!(digit_sum % 10, 0);
    }

    #[test]
    fn sfdi_rejects_short_input() {
        assert!(sfdi_from_lfdi("3e4f45ab3").is_err());
    }

    #[test]
    fn header_value_dispatches_on_armor() {
        assert!(lfdi_from_header_value(TEST_PEM).is_ok());
        assert!(lfdi_from_header_value("3e4f45ab31edfe5b67e343e5e4562e31984e23e5").is_ok());
        assert!(lfdi_from_header_value("not-a-fingerprint").is_err());
    }
}
