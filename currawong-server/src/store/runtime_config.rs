use sqlx::PgPool;

/// Dynamic server knobs held in a single-row table so they can be changed
/// without a redeploy.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct RuntimeServerConfig {
    pub dcap_pollrate_seconds: i32,
    pub edevl_pollrate_seconds: i32,
    pub fsal_pollrate_seconds: i32,
    pub derpl_pollrate_seconds: i32,
    pub derl_pollrate_seconds: i32,
    pub mup_postrate_seconds: i32,
    pub site_control_pow10_encoding: i32,
    pub disable_edev_registration: bool,
}

impl Default for RuntimeServerConfig {
    fn default() -> Self {
        RuntimeServerConfig {
            dcap_pollrate_seconds: 300,
            edevl_pollrate_seconds: 300,
            fsal_pollrate_seconds: 300,
            derpl_pollrate_seconds: 60,
            derl_pollrate_seconds: 60,
            mup_postrate_seconds: 60,
            site_control_pow10_encoding: -2,
            disable_edev_registration: false,
        }
    }
}

/// Reads the runtime config row, falling back to defaults when the row is
/// absent or the database is unhappy. Reads never fail a request.
pub async fn fetch_runtime_config(pool: &PgPool) -> RuntimeServerConfig {
    let row: Result<Option<RuntimeServerConfig>, sqlx::Error> = sqlx::query_as(
        "SELECT dcap_pollrate_seconds, edevl_pollrate_seconds, fsal_pollrate_seconds, \
                derpl_pollrate_seconds, derl_pollrate_seconds, mup_postrate_seconds, \
                site_control_pow10_encoding, disable_edev_registration \
         FROM runtime_server_config LIMIT 1",
    )
    .fetch_optional(pool)
    .await;

    match row {
        Ok(Some(config)) => config,
        Ok(None) => RuntimeServerConfig::default(),
        Err(error) => {
            warn!(%error, "Failed to read runtime config; serving defaults");
            RuntimeServerConfig::default()
        }
    }
}

pub async fn update_runtime_config(pool: &PgPool, config: &RuntimeServerConfig) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO runtime_server_config \
             (runtime_server_config_id, dcap_pollrate_seconds, edevl_pollrate_seconds, fsal_pollrate_seconds, \
              derpl_pollrate_seconds, derl_pollrate_seconds, mup_postrate_seconds, \
              site_control_pow10_encoding, disable_edev_registration, changed_time) \
         VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, now()) \
         ON CONFLICT (runtime_server_config_id) DO UPDATE SET \
             dcap_pollrate_seconds = excluded.dcap_pollrate_seconds, \
             edevl_pollrate_seconds = excluded.edevl_pollrate_seconds, \
             fsal_pollrate_seconds = excluded.fsal_pollrate_seconds, \
             derpl_pollrate_seconds = excluded.derpl_pollrate_seconds, \
             derl_pollrate_seconds = excluded.derl_pollrate_seconds, \
             mup_postrate_seconds = excluded.mup_postrate_seconds, \
             site_control_pow10_encoding = excluded.site_control_pow10_encoding, \
             disable_edev_registration = excluded.disable_edev_registration, \
             changed_time = now()",
    )
    .bind(config.dcap_pollrate_seconds)
    .bind(config.edevl_pollrate_seconds)
    .bind(config.fsal_pollrate_seconds)
    .bind(config.derpl_pollrate_seconds)
    .bind(config.derl_pollrate_seconds)
    .bind(config.mup_postrate_seconds)
    .bind(config.site_control_pow10_encoding)
    .bind(config.disable_edev_registration)
    .execute(pool)
    .await?;

    Ok(())
}
