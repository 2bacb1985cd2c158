//! Request middleware: certificate-header authentication and the CSIP-AUS
//! v1.1a namespace opt-in swap.

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt as _;

use crate::auth;
use crate::http::HttpError;
use crate::scope::{CertificateType, RawRequestClaims, NULL_AGGREGATOR_ID};
use crate::sep2::{CSIP_AUS_NS_V11, CSIP_AUS_NS_V11A};
use crate::ServerState;

/// Clients already speaking CSIP-AUS v1.1a set this header to skip the
/// legacy namespace rewrite.
pub const CSIP_V11A_OPT_IN_HEADER: &str = "x-csipaus-v11a";

/// Resolves the forwarded client certificate to [`RawRequestClaims`] and
/// attaches them to the request. Runs before any routing decisions.
pub async fn lfdi_auth(
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let conf = state.conf_handle.get_conf();

    let header_value = request
        .headers()
        .get(conf.cert_header.as_str())
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        // The TLS-terminating proxy must always forward something; a missing
        // header is a deployment fault, not a client error.
        .ok_or_else(|| HttpError::internal().msg("missing certificate PEM header/fingerprint from gateway"))?
        .to_owned();

    let lfdi = auth::lfdi_from_header_value(&header_value)
        .map_err(HttpError::bad_request().err())?;
    let sfdi = auth::sfdi_from_lfdi(&lfdi).map_err(HttpError::bad_request().err())?;
    let sfdi = i64::try_from(sfdi).map_err(HttpError::bad_request().err())?;

    let cached = state
        .cert_cache
        .get_ignore_expiry(state.pool.clone(), &lfdi)
        .await
        .map_err(HttpError::internal().err())?;

    let claims = match cached {
        Some(entry) => {
            // Known certificate: this is an aggregator client, expired or not.
            if entry.is_expired() {
                return Err(HttpError::forbidden().msg("client certificate is marked as expired by the server"));
            }
            RawRequestClaims {
                lfdi,
                sfdi,
                source: CertificateType::AggregatorCert,
                aggregator_id: Some(entry.value.aggregator_id),
                registered_site_id: None,
                href_prefix: conf.href_prefix.clone(),
                iana_pen: conf.iana_pen,
            }
        }
        None if conf.allow_device_registration => {
            // The cert passed TLS termination so its chain is valid; treat it
            // as a device certificate and look for its registered site.
            let mut conn = state
                .pool
                .acquire()
                .await
                .map_err(HttpError::internal().err())?;
            let site = crate::store::site::select_site_by_sfdi(&mut conn, NULL_AGGREGATOR_ID, sfdi)
                .await
                .map_err(HttpError::internal().err())?;

            RawRequestClaims {
                lfdi,
                sfdi,
                source: CertificateType::DeviceCert,
                aggregator_id: None,
                registered_site_id: site.map(|site| site.site_id),
                href_prefix: conf.href_prefix.clone(),
                iana_pen: conf.iana_pen,
            }
        }
        None => {
            return Err(HttpError::forbidden().msg("unrecognised client certificate"));
        }
    };

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn swap_namespace(body: Bytes, from: &str, to: &str) -> Bytes {
    // Cheap scan first; most bodies are empty or already in the right form.
    match std::str::from_utf8(&body) {
        Ok(text) if text.contains(from) => Bytes::from(text.replace(from, to)),
        _ => body,
    }
}

fn is_xml(response_or_request_content_type: Option<&str>) -> bool {
    response_or_request_content_type
        .map(|value| value.contains("xml"))
        .unwrap_or(false)
}

/// Rewrites CSIP-AUS namespaces between v1.1 (`http://csipaus.org/ns`) and
/// v1.1a (`https://csipaus.org/ns`) for clients that haven't opted in to
/// v1.1a. Bodies without the namespace pass through untouched.
pub async fn csip_v11a_opt_in(request: Request, next: Next) -> Result<Response, HttpError> {
    let opted_in = request.headers().contains_key(CSIP_V11A_OPT_IN_HEADER);
    if opted_in {
        return Ok(next.run(request).await);
    }

    // Legacy client: lift the request body to v1.1a for the handlers.
    let (parts, body) = request.into_parts();
    let request_is_xml = is_xml(parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()));
    let bytes = body
        .collect()
        .await
        .map_err(HttpError::bad_request().err())?
        .to_bytes();
    let bytes = if request_is_xml {
        swap_namespace(bytes, CSIP_AUS_NS_V11, CSIP_AUS_NS_V11A)
    } else {
        bytes
    };
    let request = Request::from_parts(parts, Body::from(bytes));

    let response = next.run(request).await;

    // And lower the response body back to v1.1.
    let (parts, body) = response.into_parts();
    if !is_xml(parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())) {
        return Ok(Response::from_parts(parts, body));
    }

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => {
            error!(%error, "Failed to buffer response body for namespace rewrite");
            return Ok(HttpError::internal().msg("response rewrite failed").into_response());
        }
    };
    let bytes = swap_namespace(bytes, CSIP_AUS_NS_V11A, CSIP_AUS_NS_V11);

    let mut response = Response::from_parts(parts, Body::from(bytes));
    response.headers_mut().remove(axum::http::header::CONTENT_LENGTH);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_swap_replaces_all_occurrences() {
        let body = Bytes::from(format!(
            r#"<ConnectionPoint xmlns="{CSIP_AUS_NS_V11}"><id xmlns="{CSIP_AUS_NS_V11}"/></ConnectionPoint>"#
        ));
        let swapped = swap_namespace(body, CSIP_AUS_NS_V11, CSIP_AUS_NS_V11A);
        let text = std::str::from_utf8(&swapped).expect("utf8");
        assert_eq!(text.matches(CSIP_AUS_NS_V11A).count(), 2);
        assert!(!text.contains(&format!(r#""{CSIP_AUS_NS_V11}""#)));
    }

    #[test]
    fn bodies_without_the_namespace_pass_through() {
        let body = Bytes::from_static(b"<EndDevice xmlns=\"urn:ieee:std:2030.5:ns\"/>");
        let swapped = swap_namespace(body.clone(), CSIP_AUS_NS_V11, CSIP_AUS_NS_V11A);
        assert_eq!(body, swapped);
    }
}
