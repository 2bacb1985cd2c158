#[macro_use]
extern crate tracing;

pub mod admin;
pub mod api;
pub mod auth;
pub mod azure;
pub mod config;
pub mod http;
pub mod log;
pub mod mapper;
pub mod middleware;
pub mod model;
pub mod mrid;
pub mod nmi;
pub mod notify;
pub mod scope;
pub mod sep2;
pub mod service;
pub mod store;

use std::sync::Arc;

use crate::auth::CertificateCache;
use crate::config::ConfHandle;
use crate::notify::NotificationHandle;

/// Shared application state, cloned into every router and task.
#[derive(Clone)]
pub struct ServerState {
    pub conf_handle: ConfHandle,
    pub pool: sqlx::PgPool,
    pub cert_cache: Arc<CertificateCache>,
    pub notifications: NotificationHandle,
}

pub const MAX_LIST_LIMIT: i64 = 100;
