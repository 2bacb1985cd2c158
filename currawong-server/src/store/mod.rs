pub mod aggregator;
pub mod archive;
pub mod auth;
pub mod der;
pub mod doe;
pub mod log_event;
pub mod reading;
pub mod response;
pub mod runtime_config;
pub mod site;
pub mod subscription;
pub mod tariff;

use anyhow::Context as _;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use time::OffsetDateTime;

/// sep2 list pagination: `s` (skip), `l` (limit), `a` (changed-after epoch).
#[derive(Debug, Clone, Copy)]
pub struct ListParams {
    pub start: i64,
    pub limit: i64,
    pub after: OffsetDateTime,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            start: 0,
            limit: 1,
            after: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

/// Connects with a pool that recycles connections after `max_lifetime_secs`,
/// used when database credentials rotate (e.g. Azure AD tokens).
pub async fn connect_with_recycling(database_url: &str, max_lifetime_secs: u64) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .max_lifetime(std::time::Duration::from_secs(max_lifetime_secs))
        .connect(database_url)
        .await
        .context("connect to database")
}
