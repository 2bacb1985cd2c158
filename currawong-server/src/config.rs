use std::env;
use std::sync::Arc;

use anyhow::Context as _;
use camino::Utf8PathBuf;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tap::prelude::*;
use tokio::sync::Notify;

pub const DEFAULT_CERT_HEADER: &str = "x-forwarded-client-cert";
const CONF_FILE_ENV: &str = "CURRAWONG_CONFIG_PATH";
const ENV_PREFIX: &str = "CURRAWONG_";

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Conf {
    pub listen_addr: String,
    pub database_url: String,
    /// Request header carrying the forwarded client TLS PEM or fingerprint.
    pub cert_header: String,
    pub allow_device_registration: bool,
    pub href_prefix: Option<String>,
    /// IANA Private Enterprise Number embedded in every generated MRID.
    pub iana_pen: u32,
    pub default_doe: DefaultDoeConfiguration,
    pub enable_notifications: bool,
    /// Empty/absent means the in-memory broker.
    pub rabbit_mq_broker_url: Option<String>,
    pub azure_ad: Option<AzureAdConf>,
    pub install_csip_v11a_opt_in_middleware: bool,
    pub nmi_validation_enabled: bool,
    pub nmi_validation_participant_id: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub read_only_admin_username: Option<String>,
    pub read_only_admin_password: Option<String>,
    pub log_file: Option<Utf8PathBuf>,
    pub log_directive: Option<String>,
}

/// Globally configured fallback control limits, merged underneath any
/// per-site defaults at fetch time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultDoeConfiguration {
    pub import_limit_active_watts: Option<Decimal>,
    pub export_limit_active_watts: Option<Decimal>,
    pub generation_limit_active_watts: Option<Decimal>,
    pub load_limit_active_watts: Option<Decimal>,
    pub ramp_rate_percent_per_second: Option<i16>,
}

impl DefaultDoeConfiguration {
    pub fn is_empty(&self) -> bool {
        self.import_limit_active_watts.is_none()
            && self.export_limit_active_watts.is_none()
            && self.generation_limit_active_watts.is_none()
            && self.load_limit_active_watts.is_none()
            && self.ramp_rate_percent_per_second.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct AzureAdConf {
    pub tenant_id: String,
    pub client_id: String,
    pub valid_issuer: String,
    pub db_resource_id: Option<String>,
    pub db_refresh_secs: u64,
}

impl Conf {
    pub fn from_conf_file(conf_file: &dto::ConfFile) -> anyhow::Result<Self> {
        let database_url = conf_file
            .database_url
            .clone()
            .context("database_url is required")?;

        let iana_pen = conf_file.iana_pen.context("iana_pen is required")?;

        let azure_ad = match (
            conf_file.azure_ad_tenant_id.as_ref(),
            conf_file.azure_ad_client_id.as_ref(),
            conf_file.azure_ad_valid_issuer.as_ref(),
        ) {
            (Some(tenant_id), Some(client_id), Some(valid_issuer)) => Some(AzureAdConf {
                tenant_id: tenant_id.clone(),
                client_id: client_id.clone(),
                valid_issuer: valid_issuer.clone(),
                db_resource_id: conf_file.azure_ad_db_resource_id.clone(),
                db_refresh_secs: conf_file.azure_ad_db_refresh_secs.unwrap_or(14400),
            }),
            _ => None,
        };

        let href_prefix = conf_file
            .href_prefix
            .clone()
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| {
                if prefix.starts_with('/') {
                    prefix
                } else {
                    format!("/{prefix}")
                }
            });

        Ok(Conf {
            listen_addr: conf_file
                .listen_addr
                .clone()
                .unwrap_or_else(|| String::from("0.0.0.0:8000")),
            database_url,
            cert_header: conf_file
                .cert_header
                .clone()
                .unwrap_or_else(|| String::from(DEFAULT_CERT_HEADER))
                .to_lowercase(),
            allow_device_registration: conf_file.allow_device_registration.unwrap_or(false),
            href_prefix,
            iana_pen,
            default_doe: DefaultDoeConfiguration {
                import_limit_active_watts: conf_file.default_doe_import_active_watts,
                export_limit_active_watts: conf_file.default_doe_export_active_watts,
                generation_limit_active_watts: conf_file.default_doe_generation_active_watts,
                load_limit_active_watts: conf_file.default_doe_load_active_watts,
                ramp_rate_percent_per_second: conf_file.default_doe_ramp_rate_percent_per_second,
            },
            enable_notifications: conf_file.enable_notifications.unwrap_or(false),
            rabbit_mq_broker_url: conf_file
                .rabbit_mq_broker_url
                .clone()
                .filter(|url| !url.is_empty()),
            azure_ad,
            install_csip_v11a_opt_in_middleware: conf_file
                .install_csip_v11a_opt_in_middleware
                .unwrap_or(false),
            nmi_validation_enabled: conf_file.nmi_validation_enabled.unwrap_or(false),
            nmi_validation_participant_id: conf_file.nmi_validation_participant_id.clone(),
            admin_username: conf_file.admin_username.clone(),
            admin_password: conf_file.admin_password.clone(),
            read_only_admin_username: conf_file.read_only_admin_username.clone(),
            read_only_admin_password: conf_file.read_only_admin_password.clone(),
            log_file: conf_file.log_file.clone(),
            log_directive: conf_file.log_directive.clone(),
        })
    }
}

pub mod dto {
    use super::*;

    /// On-disk / environment form of the configuration.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default, rename_all = "PascalCase")]
    pub struct ConfFile {
        pub listen_addr: Option<String>,
        pub database_url: Option<String>,
        pub cert_header: Option<String>,
        pub allow_device_registration: Option<bool>,
        pub href_prefix: Option<String>,
        pub iana_pen: Option<u32>,
        pub default_doe_import_active_watts: Option<Decimal>,
        pub default_doe_export_active_watts: Option<Decimal>,
        pub default_doe_generation_active_watts: Option<Decimal>,
        pub default_doe_load_active_watts: Option<Decimal>,
        pub default_doe_ramp_rate_percent_per_second: Option<i16>,
        pub enable_notifications: Option<bool>,
        pub rabbit_mq_broker_url: Option<String>,
        pub azure_ad_tenant_id: Option<String>,
        pub azure_ad_client_id: Option<String>,
        pub azure_ad_valid_issuer: Option<String>,
        pub azure_ad_db_resource_id: Option<String>,
        pub azure_ad_db_refresh_secs: Option<u64>,
        pub install_csip_v11a_opt_in_middleware: Option<bool>,
        pub nmi_validation_enabled: Option<bool>,
        pub nmi_validation_participant_id: Option<String>,
        pub admin_username: Option<String>,
        pub admin_password: Option<String>,
        pub read_only_admin_username: Option<String>,
        pub read_only_admin_password: Option<String>,
        pub log_file: Option<Utf8PathBuf>,
        pub log_directive: Option<String>,
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{key}")).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_var(key).map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.parse().ok())
}

/// Reads the configuration file (if any) and applies environment overrides.
fn load_conf_file() -> anyhow::Result<dto::ConfFile> {
    let mut conf_file = match env::var(CONF_FILE_ENV).ok().filter(|p| !p.is_empty()) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("couldn’t read config file at {path}"))?
            .pipe_deref(serde_json::from_str)
            .context("invalid JSON config")?,
        None => dto::ConfFile::default(),
    };

    if let Some(v) = env_var("LISTEN_ADDR") {
        conf_file.listen_addr = Some(v);
    }
    if let Some(v) = env_var("DATABASE_URL") {
        conf_file.database_url = Some(v);
    }
    if let Some(v) = env_var("CERT_HEADER") {
        conf_file.cert_header = Some(v);
    }
    if let Some(v) = env_bool("ALLOW_DEVICE_REGISTRATION") {
        conf_file.allow_device_registration = Some(v);
    }
    if let Some(v) = env_var("HREF_PREFIX") {
        conf_file.href_prefix = Some(v);
    }
    if let Some(v) = env_parse("IANA_PEN") {
        conf_file.iana_pen = Some(v);
    }
    if let Some(v) = env_parse("DEFAULT_DOE_IMPORT_ACTIVE_WATTS") {
        conf_file.default_doe_import_active_watts = Some(v);
    }
    if let Some(v) = env_parse("DEFAULT_DOE_EXPORT_ACTIVE_WATTS") {
        conf_file.default_doe_export_active_watts = Some(v);
    }
    if let Some(v) = env_parse("DEFAULT_DOE_GENERATION_ACTIVE_WATTS") {
        conf_file.default_doe_generation_active_watts = Some(v);
    }
    if let Some(v) = env_parse("DEFAULT_DOE_LOAD_ACTIVE_WATTS") {
        conf_file.default_doe_load_active_watts = Some(v);
    }
    if let Some(v) = env_bool("ENABLE_NOTIFICATIONS") {
        conf_file.enable_notifications = Some(v);
    }
    if let Some(v) = env_var("RABBIT_MQ_BROKER_URL") {
        conf_file.rabbit_mq_broker_url = Some(v);
    }
    if let Some(v) = env_var("AZURE_AD_TENANT_ID") {
        conf_file.azure_ad_tenant_id = Some(v);
    }
    if let Some(v) = env_var("AZURE_AD_CLIENT_ID") {
        conf_file.azure_ad_client_id = Some(v);
    }
    if let Some(v) = env_var("AZURE_AD_VALID_ISSUER") {
        conf_file.azure_ad_valid_issuer = Some(v);
    }
    if let Some(v) = env_var("AZURE_AD_DB_RESOURCE_ID") {
        conf_file.azure_ad_db_resource_id = Some(v);
    }
    if let Some(v) = env_parse("AZURE_AD_DB_REFRESH_SECS") {
        conf_file.azure_ad_db_refresh_secs = Some(v);
    }
    if let Some(v) = env_bool("INSTALL_CSIP_V11A_OPT_IN_MIDDLEWARE") {
        conf_file.install_csip_v11a_opt_in_middleware = Some(v);
    }
    if let Some(v) = env_bool("NMI_VALIDATION_ENABLED") {
        conf_file.nmi_validation_enabled = Some(v);
    }
    if let Some(v) = env_var("NMI_VALIDATION_PARTICIPANT_ID") {
        conf_file.nmi_validation_participant_id = Some(v);
    }
    if let Some(v) = env_var("ADMIN_USERNAME") {
        conf_file.admin_username = Some(v);
    }
    if let Some(v) = env_var("ADMIN_PASSWORD") {
        conf_file.admin_password = Some(v);
    }
    if let Some(v) = env_var("READ_ONLY_ADMIN_USERNAME") {
        conf_file.read_only_admin_username = Some(v);
    }
    if let Some(v) = env_var("READ_ONLY_ADMIN_PASSWORD") {
        conf_file.read_only_admin_password = Some(v);
    }
    if let Some(v) = env_var("LOG_FILE") {
        conf_file.log_file = Some(Utf8PathBuf::from(v));
    }
    if let Some(v) = env_var("LOG_DIRECTIVE") {
        conf_file.log_directive = Some(v);
    }

    Ok(conf_file)
}

#[derive(Clone)]
pub struct ConfHandle {
    inner: Arc<ConfHandleInner>,
}

struct ConfHandleInner {
    conf: parking_lot::RwLock<Arc<Conf>>,
    conf_file: parking_lot::RwLock<Arc<dto::ConfFile>>,
    changed: Notify,
}

impl ConfHandle {
    /// Initializes configuration for this instance.
    ///
    /// It's best to call this only once to avoid inconsistencies.
    pub fn init() -> anyhow::Result<Self> {
        let conf_file = load_conf_file()?;
        let conf = Conf::from_conf_file(&conf_file).context("invalid configuration")?;
        Ok(Self::from_parts(conf, conf_file))
    }

    #[doc(hidden)]
    pub fn mock(json_config: &str) -> anyhow::Result<Self> {
        let conf_file = serde_json::from_str::<dto::ConfFile>(json_config).context("invalid JSON config")?;
        let conf = Conf::from_conf_file(&conf_file).context("invalid configuration")?;
        Ok(Self::from_parts(conf, conf_file))
    }

    fn from_parts(conf: Conf, conf_file: dto::ConfFile) -> Self {
        Self {
            inner: Arc::new(ConfHandleInner {
                conf: parking_lot::RwLock::new(Arc::new(conf)),
                conf_file: parking_lot::RwLock::new(Arc::new(conf_file)),
                changed: Notify::new(),
            }),
        }
    }

    /// Returns current configuration state (do not hold it forever as it may become outdated).
    pub fn get_conf(&self) -> Arc<Conf> {
        self.inner.conf.read().clone()
    }

    pub fn get_conf_file(&self) -> Arc<dto::ConfFile> {
        self.inner.conf_file.read().clone()
    }

    /// Waits for configuration to be changed.
    pub async fn change_notified(&self) {
        self.inner.changed.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let handle = ConfHandle::mock(r#"{"DatabaseUrl": "postgres://localhost/x", "IanaPen": 1234}"#)
            .expect("valid config");
        let conf = handle.get_conf();

        assert_eq!(conf.cert_header, DEFAULT_CERT_HEADER);
        assert!(!conf.allow_device_registration);
        assert!(!conf.enable_notifications);
        assert_eq!(conf.iana_pen, 1234);
        assert!(conf.default_doe.is_empty());
    }

    #[test]
    fn missing_database_url_is_rejected() {
        assert!(ConfHandle::mock(r#"{"IanaPen": 1}"#).is_err());
    }

    #[test]
    fn href_prefix_is_normalized_to_leading_slash() {
        let handle = ConfHandle::mock(
            r#"{"DatabaseUrl": "postgres://localhost/x", "IanaPen": 1, "HrefPrefix": "nested/prefix"}"#,
        )
        .expect("valid config");
        assert_eq!(handle.get_conf().href_prefix.as_deref(), Some("/nested/prefix"));
    }

    #[test]
    fn azure_ad_requires_all_three_identifiers() {
        let handle = ConfHandle::mock(
            r#"{"DatabaseUrl": "postgres://localhost/x", "IanaPen": 1, "AzureAdTenantId": "t"}"#,
        )
        .expect("valid config");
        assert!(handle.get_conf().azure_ad.is_none());
    }
}
