use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::models::{LogConfig, LogFormat};

/// Initialize the global subscriber for a service.
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn init_tracing(service: &str, config: &LogConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .wrap_err_with(|| format!("Invalid log level: {}", config.level))?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt_layer
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Pretty => Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .try_init(),
    }
    .wrap_err("A global tracing subscriber is already installed")?;

    tracing::info!(service, format = ?config.format, "Structured logging initialized");
    Ok(())
}

/// Create a request-scoped tracing span
pub fn create_request_span(method: &str, path: &str, request_id: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        http.method = method,
        http.path = path,
        request.id = request_id,
    )
}
