use std::path::Path;

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;

/// Sends logs to daily rolling files under `<data_dir>/logs`. Nothing goes to
/// stdout, the terminal belongs to the UI.
pub fn enable_logging(data_dir: &Path, log_level: Option<LevelFilter>) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix("flowtime")
        .filename_suffix("log")
        .build(data_dir.join("logs"))?;

    let level = log_level
        .map(|v| v.to_string())
        .unwrap_or_else(|| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(format!(
            "{}={level}",
            env!("CARGO_PKG_NAME").replace('-', "_"),
        )))
        .with_writer(appender)
        .with_ansi(false)
        .init();
    Ok(())
}

#[cfg(test)]
pub static TEST_LOGGING: std::sync::LazyLock<()> = std::sync::LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .try_init();
});
