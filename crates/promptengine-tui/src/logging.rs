use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use promptengine_core::Config;

pub const LOG_FILE: &str = "promptengine.log";

/// Filter directive: `--log-level`, then the config file, then `info`.
/// `RUST_LOG` overrides all of them.
fn level<'a>(cli_level: Option<&'a str>, config: &'a Config) -> &'a str {
    cli_level
        .or(config.log_level.as_deref())
        .unwrap_or("info")
}

/// Log to a file in the config directory; the terminal belongs to the UI.
///
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init(config: &Config, cli_level: Option<&str>) -> Result<WorkerGuard> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level(cli_level, config)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}
