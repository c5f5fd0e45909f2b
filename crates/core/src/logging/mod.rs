pub mod log_level;

pub use log_level::{LogFormat, LogLevel};

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化日志系统
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let level: LogLevel = log_level.parse().map_err(|e| anyhow::anyhow!("{e}"))?;
    let format: LogFormat = log_format.parse().map_err(|e| anyhow::anyhow!("{e}"))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("初始化文本日志格式失败")?,
    }

    Ok(())
}
