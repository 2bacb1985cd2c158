//! HTTP Basic-authenticated admin surface (JSON, not sep2 XML). Distribution
//! network operators use this to manage aggregators, certificates, tariffs
//! and controls, and to audit the archive.

pub mod aggregator;
pub mod archive;
pub mod config;
pub mod control;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;
use base64::prelude::{Engine as _, BASE64_STANDARD};

use crate::http::HttpError;
use crate::ServerState;

/// Identity attached to every admin request.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser {
    pub read_only: bool,
}

fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = BASE64_STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_owned(), password.to_owned()))
}

/// Checks Basic credentials against the configured admin users. Read-only
/// credentials are restricted to GET/HEAD.
pub async fn admin_auth(
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let conf = state.conf_handle.get_conf();

    let (user, password) = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic_auth)
        .ok_or_else(|| HttpError::unauthorized().msg("missing admin credentials"))?;

    let full_access = matches!(
        (&conf.admin_username, &conf.admin_password),
        (Some(expected_user), Some(expected_password))
            if *expected_user == user && *expected_password == password
    );
    let read_only = !full_access
        && matches!(
            (&conf.read_only_admin_username, &conf.read_only_admin_password),
            (Some(expected_user), Some(expected_password))
                if *expected_user == user && *expected_password == password
        );

    if !full_access && !read_only {
        return Err(HttpError::unauthorized().msg("bad admin credentials"));
    }

    if read_only && !matches!(*request.method(), Method::GET | Method::HEAD) {
        return Err(HttpError::forbidden().msg("read-only credentials cannot write"));
    }

    request.extensions_mut().insert(AdminUser { read_only });
    Ok(next.run(request).await)
}

pub fn make_router(state: ServerState) -> Router {
    Router::new()
        .route(
            "/aggregators",
            get(aggregator::list_aggregators).post(aggregator::create_aggregator),
        )
        .route("/aggregators/{aggregator_id}", get(aggregator::get_aggregator))
        .route(
            "/aggregators/{aggregator_id}/certificates",
            get(aggregator::list_certificates).post(aggregator::assign_certificate),
        )
        .route(
            "/aggregators/{aggregator_id}/certificates/{certificate_id}",
            axum::routing::delete(aggregator::unassign_certificate),
        )
        .route(
            "/site-control-groups",
            get(control::list_site_control_groups).post(control::create_site_control_group),
        )
        .route(
            "/site-control-groups/{group_id}/defaults",
            put(control::update_site_control_group_defaults),
        )
        .route("/site-control-groups/{group_id}/does", post(control::upsert_does))
        .route("/sites/{site_id}/default-control", post(control::upsert_default_site_control))
        .route("/tariffs/{tariff_id}/rates", post(control::upsert_rates))
        .route("/archive/{resource}", get(archive::read_archive))
        .route("/config", get(config::get_runtime_config).put(config::update_runtime_config))
        .layer(axum::middleware::from_fn_with_state(state.clone(), admin_auth))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_parses_user_and_password() {
        let header = format!("Basic {}", BASE64_STANDARD.encode("admin:hunter2"));
        assert_eq!(
            parse_basic_auth(&header),
            Some((String::from("admin"), String::from("hunter2")))
        );
        assert_eq!(parse_basic_auth("Bearer token"), None);
    }
}
