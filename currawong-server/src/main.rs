#[macro_use]
extern crate tracing;

use anyhow::Context as _;
use currawong_server::config::ConfHandle;
use currawong_server::{log, service};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let conf_handle = ConfHandle::init().context("failed to load configuration")?;
    let conf = conf_handle.get_conf();

    let _logger_guard = log::init(conf.log_file.as_deref(), conf.log_directive.as_deref())
        .context("failed to setup logger")?;

    info!(version = env!("CARGO_PKG_VERSION"));

    service::run(conf_handle).await
}
