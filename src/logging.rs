use anyhow::{Context, Result};
use log::LevelFilter;

/// 安装全局日志
pub fn init_logging(level: LevelFilter) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("hyper_util", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("pdf_extract", LevelFilter::Error)
        .chain(std::io::stdout())
        .apply()
        .context("Failed to install logger")?;

    Ok(())
}
