//! Telemetry setup

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LogSettings};
use crate::error::AppError;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// The returned guard flushes buffered log lines on drop and must be held for
/// the lifetime of the process.
pub fn init_telemetry(settings: &LogSettings) -> Result<WorkerGuard, AppError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| AppError::TelemetryError(e.to_string()))?;

    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match settings.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_writer(writer))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_writer(writer))
            .try_init(),
    };
    installed.map_err(|e| AppError::TelemetryError(e.to_string()))?;

    Ok(guard)
}
