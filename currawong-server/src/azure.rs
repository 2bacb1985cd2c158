//! Azure managed-identity support: instance-metadata token minting (used as
//! rotating database credentials) and the tenant JWKs cache. Both lean on
//! the same expiring cache the certificate lookup uses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use currawong_task::{ShutdownSignal, Task};
use expiring_cache::{ExpiringCache, ExpiringValue, UpdateFn};
use serde::Deserialize;
use time::OffsetDateTime;

const INSTANCE_METADATA_TOKEN_URL: &str =
    "http://169.254.169.254/metadata/identity/oauth2/token?api-version=2018-02-01";

pub const METADATA_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedIdentityToken {
    pub access_token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Epoch seconds, as a string, because that's what the endpoint returns.
    expires_on: String,
}

/// Cache argument: everything needed to mint a token for one resource.
#[derive(Clone)]
pub struct TokenFetchArgs {
    pub client: reqwest::Client,
    pub resource_id: String,
    pub client_id: String,
}

pub type TokenCache = ExpiringCache<TokenFetchArgs, String, ManagedIdentityToken>;

/// Key under which the (single) DB token lives in its cache.
pub const DB_TOKEN_KEY: &str = "db";

pub fn new_token_cache() -> Arc<TokenCache> {
    let update_fn: UpdateFn<TokenFetchArgs, String, ManagedIdentityToken> = Arc::new(|args| {
        Box::pin(async move {
            let token = fetch_managed_identity_token(&args).await?;
            let mut contents = HashMap::new();
            contents.insert(
                DB_TOKEN_KEY.to_owned(),
                ExpiringValue::new(Some(token.expires_at), token),
            );
            Ok(contents)
        })
    });

    Arc::new(ExpiringCache::new(update_fn))
}

async fn fetch_managed_identity_token(args: &TokenFetchArgs) -> anyhow::Result<ManagedIdentityToken> {
    let url = format!(
        "{INSTANCE_METADATA_TOKEN_URL}&resource={}&client_id={}",
        args.resource_id, args.client_id
    );

    let response: TokenResponse = args
        .client
        .get(&url)
        .header("Metadata", "true")
        .send()
        .await
        .context("request managed identity token")?
        .error_for_status()
        .context("managed identity token request rejected")?
        .json()
        .await
        .context("decode managed identity token")?;

    let expires_on: i64 = response
        .expires_on
        .parse()
        .context("managed identity token carries a non-numeric expires_on")?;

    Ok(ManagedIdentityToken {
        access_token: response.access_token,
        expires_at: OffsetDateTime::from_unix_timestamp(expires_on)
            .context("managed identity token expiry out of range")?,
    })
}

/// One RSA public key from the tenant JWKs document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JsonWebKey {
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<JsonWebKey>,
}

pub type JwksCache = ExpiringCache<(reqwest::Client, String), String, JsonWebKey>;

const JWKS_REFRESH_INTERVAL: time::Duration = time::Duration::hours(24);

/// Key cache for validating Azure AD bearer tokens; keys roll rarely so a
/// daily expiry with refresh-on-miss is plenty.
pub fn new_jwks_cache() -> Arc<JwksCache> {
    let update_fn: UpdateFn<(reqwest::Client, String), String, JsonWebKey> = Arc::new(|(client, tenant_id)| {
        Box::pin(async move {
            let url = format!("https://login.microsoftonline.com/{tenant_id}/discovery/v2.0/keys");
            let document: JwksDocument = client
                .get(&url)
                .send()
                .await
                .context("request tenant JWKs")?
                .error_for_status()
                .context("tenant JWKs request rejected")?
                .json()
                .await
                .context("decode tenant JWKs")?;

            let expiry = OffsetDateTime::now_utc() + JWKS_REFRESH_INTERVAL;
            Ok(document
                .keys
                .into_iter()
                .map(|key| (key.kid.clone(), ExpiringValue::new(Some(expiry), key)))
                .collect())
        })
    });

    Arc::new(ExpiringCache::new(update_fn))
}

/// Builds the database DSN with the current managed-identity token as the
/// password. The pool's `max_lifetime` must stay below the refresh period so
/// no connection outlives its credentials.
pub async fn database_url_with_token(
    base_url: &str,
    token_cache: &Arc<TokenCache>,
    args: TokenFetchArgs,
) -> anyhow::Result<String> {
    let token = token_cache
        .get(args, &DB_TOKEN_KEY.to_owned())
        .await?
        .context("no database token available")?;

    let mut url = url::Url::parse(base_url).context("parse database_url")?;
    url.set_password(Some(&token.access_token))
        .map_err(|()| anyhow::anyhow!("database_url cannot carry a password"))?;
    Ok(url.into())
}

/// Keeps the Azure material warm: force-refreshes the DB credential token on
/// a fixed interval (so connection churn never waits on the metadata
/// endpoint) and re-pulls the tenant JWKs alongside it.
pub struct TokenRefreshTask {
    pub token_cache: Arc<TokenCache>,
    pub args: TokenFetchArgs,
    pub refresh_secs: u64,
    pub jwks: Option<(Arc<JwksCache>, String)>,
}

#[async_trait]
impl Task for TokenRefreshTask {
    type Output = anyhow::Result<()>;

    const NAME: &'static str = "azure token refresh";

    async fn run(self, mut shutdown_signal: ShutdownSignal) -> Self::Output {
        debug!("Task started");

        loop {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(self.refresh_secs)) => {
                    self.token_cache.force_update(self.args.clone()).await;
                    if let Some((jwks_cache, tenant_id)) = &self.jwks {
                        jwks_cache
                            .force_update((self.args.client.clone(), tenant_id.clone()))
                            .await;
                    }
                    trace!("Refreshed managed identity credentials");
                }
                () = shutdown_signal.wait() => break,
            }
        }

        debug!("Task terminated");
        Ok(())
    }
}
