//! Per-request authorization scopes.
//!
//! The auth middleware attaches [`RawRequestClaims`] to every request; the
//! extractors below refine those claims into progressively narrower scopes.
//! Handlers name the scope they need as a parameter and the refinement chain
//! rejects anything that doesn't hold.

use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::request::Parts;
use axum::Extension;

use crate::http::HttpError;

/// Reserved aggregator owning sites registered directly by device certs.
pub const NULL_AGGREGATOR_ID: i64 = 0;

/// `/edev/0` is the aggregator's own virtual end-device: a stand-in for
/// "all sites of this aggregator" rather than a physical premise.
pub const VIRTUAL_END_DEVICE_SITE_ID: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateType {
    AggregatorCert,
    DeviceCert,
}

/// Claims established by the auth middleware before any path routing.
#[derive(Debug, Clone)]
pub struct RawRequestClaims {
    pub lfdi: String,
    pub sfdi: i64,
    pub source: CertificateType,
    /// Present for aggregator certs only.
    pub aggregator_id: Option<i64>,
    /// The registered site for a device cert, when one exists.
    pub registered_site_id: Option<i64>,
    pub href_prefix: Option<String>,
    pub iana_pen: u32,
}

/// Broadest refinement: enough for `/dcap`, `/tm` and `POST /edev`.
#[derive(Debug, Clone)]
pub struct UnregisteredScope {
    pub lfdi: String,
    pub sfdi: i64,
    pub source: CertificateType,
    pub aggregator_id: i64,
    pub registered_site_id: Option<i64>,
    pub href_prefix: Option<String>,
    pub iana_pen: u32,
}

impl UnregisteredScope {
    fn from_claims(claims: RawRequestClaims) -> Self {
        let aggregator_id = match claims.source {
            CertificateType::AggregatorCert => claims.aggregator_id.unwrap_or(NULL_AGGREGATOR_ID),
            CertificateType::DeviceCert => NULL_AGGREGATOR_ID,
        };
        Self {
            lfdi: claims.lfdi,
            sfdi: claims.sfdi,
            source: claims.source,
            aggregator_id,
            registered_site_id: claims.registered_site_id,
            href_prefix: claims.href_prefix,
            iana_pen: claims.iana_pen,
        }
    }
}

impl<S> FromRequestParts<S> for UnregisteredScope
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = Extension::<RawRequestClaims>::from_request_parts(parts, state)
            .await
            .map_err(HttpError::internal().err())?
            .0;
        Ok(Self::from_claims(claims))
    }
}

/// Scope with a resolved target end-device from the request path.
///
/// `site_id` of `None` means the virtual end-device was requested: reads
/// span every site of the aggregator.
#[derive(Debug, Clone)]
pub struct DeviceOrAggregatorScope {
    pub lfdi: String,
    pub sfdi: i64,
    pub source: CertificateType,
    pub aggregator_id: i64,
    /// The site id as requested (0 = virtual end-device).
    pub display_site_id: i64,
    /// The concrete site filter, `None` for the virtual end-device.
    pub site_id: Option<i64>,
    pub href_prefix: Option<String>,
    pub iana_pen: u32,
}

impl DeviceOrAggregatorScope {
    pub fn narrow(scope: UnregisteredScope, requested_site_id: i64) -> Result<Self, HttpError> {
        match scope.source {
            CertificateType::AggregatorCert => {}
            CertificateType::DeviceCert => {
                // A device cert only ever sees its own registered site; the
                // virtual end-device is an aggregator concept.
                if scope.registered_site_id != Some(requested_site_id) {
                    return Err(HttpError::not_found().msg("no such end device in scope"));
                }
            }
        }

        let site_id = if requested_site_id == VIRTUAL_END_DEVICE_SITE_ID {
            None
        } else {
            Some(requested_site_id)
        };

        Ok(Self {
            lfdi: scope.lfdi,
            sfdi: scope.sfdi,
            source: scope.source,
            aggregator_id: scope.aggregator_id,
            display_site_id: requested_site_id,
            site_id,
            href_prefix: scope.href_prefix,
            iana_pen: scope.iana_pen,
        })
    }

    pub fn href(&self, uri: &str) -> String {
        crate::http::generate_href(self.href_prefix.as_deref(), uri)
    }
}

fn site_id_from_path(params: &RawPathParams) -> Result<i64, HttpError> {
    params
        .iter()
        .find(|(name, _)| *name == "site_id")
        .map(|(_, value)| value.parse::<i64>())
        .transpose()
        .map_err(HttpError::bad_request().err())?
        .filter(|site_id| *site_id >= 0)
        .ok_or_else(|| HttpError::bad_request().msg("invalid end device id"))
}

impl<S> FromRequestParts<S> for DeviceOrAggregatorScope
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let scope = UnregisteredScope::from_request_parts(parts, state).await?;
        let params = RawPathParams::from_request_parts(parts, state)
            .await
            .map_err(HttpError::internal().err())?;
        let requested_site_id = site_id_from_path(&params)?;
        Self::narrow(scope, requested_site_id)
    }
}

/// Scope asserting a concrete (non-virtual) site, required for per-site
/// mutations.
#[derive(Debug, Clone)]
pub struct SiteScope {
    pub lfdi: String,
    pub sfdi: i64,
    pub source: CertificateType,
    pub aggregator_id: i64,
    pub site_id: i64,
    pub href_prefix: Option<String>,
    pub iana_pen: u32,
}

impl SiteScope {
    pub fn narrow(scope: DeviceOrAggregatorScope) -> Result<Self, HttpError> {
        let Some(site_id) = scope.site_id else {
            return Err(HttpError::not_found().msg("virtual end device has no such resource"));
        };
        Ok(Self {
            lfdi: scope.lfdi,
            sfdi: scope.sfdi,
            source: scope.source,
            aggregator_id: scope.aggregator_id,
            site_id,
            href_prefix: scope.href_prefix,
            iana_pen: scope.iana_pen,
        })
    }

    pub fn href(&self, uri: &str) -> String {
        crate::http::generate_href(self.href_prefix.as_deref(), uri)
    }
}

impl<S> FromRequestParts<S> for SiteScope
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let scope = DeviceOrAggregatorScope::from_request_parts(parts, state).await?;
        Self::narrow(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator_claims() -> RawRequestClaims {
        RawRequestClaims {
            lfdi: String::from("3e4f45ab31edfe5b67e343e5e4562e31984e23e5"),
            sfdi: 167_261_211_391,
            source: CertificateType::AggregatorCert,
            aggregator_id: Some(7),
            registered_site_id: None,
            href_prefix: None,
            iana_pen: 1234,
        }
    }

    fn device_claims(registered_site_id: Option<i64>) -> RawRequestClaims {
        RawRequestClaims {
            source: CertificateType::DeviceCert,
            aggregator_id: None,
            registered_site_id,
            ..aggregator_claims()
        }
    }

    #[test]
    fn aggregator_cert_narrows_to_any_site() {
        let scope = UnregisteredScope::from_claims(aggregator_claims());
        assert_eq!(scope.aggregator_id, 7);

        let narrowed = DeviceOrAggregatorScope::narrow(scope, 42).expect("in scope");
        assert_eq!(narrowed.site_id, Some(42));
        assert_eq!(narrowed.display_site_id, 42);
    }

    #[test]
    fn aggregator_cert_virtual_end_device_means_unscoped() {
        let scope = UnregisteredScope::from_claims(aggregator_claims());
        let narrowed =
            DeviceOrAggregatorScope::narrow(scope, VIRTUAL_END_DEVICE_SITE_ID).expect("in scope");
        assert_eq!(narrowed.site_id, None);
        assert!(SiteScope::narrow(narrowed).is_err());
    }

    #[test]
    fn device_cert_is_pinned_to_null_aggregator_and_own_site() {
        let scope = UnregisteredScope::from_claims(device_claims(Some(3)));
        assert_eq!(scope.aggregator_id, NULL_AGGREGATOR_ID);

        assert!(DeviceOrAggregatorScope::narrow(scope.clone(), 4).is_err());
        let narrowed = DeviceOrAggregatorScope::narrow(scope, 3).expect("own site");
        assert_eq!(narrowed.site_id, Some(3));

        let site_scope = SiteScope::narrow(narrowed).expect("concrete site");
        assert_eq!(site_scope.site_id, 3);
    }

    #[test]
    fn unregistered_device_cert_cannot_reach_site_scopes() {
        let scope = UnregisteredScope::from_claims(device_claims(None));
        assert!(DeviceOrAggregatorScope::narrow(scope, 1).is_err());
    }
}
