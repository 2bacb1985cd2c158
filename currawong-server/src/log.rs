use std::io;

use anyhow::Context as _;
use camino::Utf8Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const MAX_BYTES_PER_LOG_FILE: u64 = 3_000_000;
const MAX_LOG_FILES: usize = 10;

pub struct LoggerGuard {
    _file_guard: Option<WorkerGuard>,
    _stdio_guard: WorkerGuard,
}

/// Installs the global tracing subscriber: a non-blocking stdout layer plus,
/// when a path is configured, a size-rotated file layer.
pub fn init(log_file: Option<&Utf8Path>, log_directive: Option<&str>) -> anyhow::Result<LoggerGuard> {
    let env_filter = EnvFilter::try_new(log_directive.unwrap_or("info"))
        .context("invalid log filtering directives")?;

    let (non_blocking_stdio, stdio_guard) = tracing_appender::non_blocking(io::stdout());
    let stdio_layer = fmt::layer().with_writer(non_blocking_stdio);

    let (file_layer, file_guard) = match log_file {
        Some(path) => {
            let folder = path.parent().context("invalid log path (parent)")?;
            let prefix = path.file_name().context("invalid log path (file_name)")?;

            let file_appender = rolling::Builder::new()
                .rotation(rolling::Rotation::max_bytes(MAX_BYTES_PER_LOG_FILE))
                .filename_prefix(prefix)
                .filename_suffix("log")
                .max_log_files(MAX_LOG_FILES)
                .build(folder)
                .context("couldn’t create file appender")?;

            let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking_file).with_ansi(false);
            (Some(layer), Some(file_guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdio_layer)
        .with(file_layer)
        .init();

    Ok(LoggerGuard {
        _file_guard: file_guard,
        _stdio_guard: stdio_guard,
    })
}
