use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

const DEFAULT_FILTER: &str = "newsfeed=info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `log.level`. When `log.file` is set, output goes to
/// that file through a background writer; keep the returned guard alive until
/// exit so buffered lines are flushed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().or_else(|_| {
    let directive = match config.level.as_deref() {
      Some(level) => format!("newsfeed={}", level),
      None => DEFAULT_FILTER.to_string(),
    };
    EnvFilter::try_new(directive)
  })?;

  match &config.file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;

      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

      let appender = tracing_appender::rolling::never(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);

      tracing_subscriber::registry()
        .with(filter)
        .with(
          tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false),
        )
        .try_init()?;

      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(
          tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact(),
        )
        .try_init()?;

      Ok(None)
    }
  }
}
