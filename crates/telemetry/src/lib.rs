//! Tracing subscriber bootstrap shared by every bookstore binary.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

use bookstore_kernel::settings::{LogFormat, TelemetrySettings};

/// Build the log filter. `RUST_LOG` takes precedence over the configured directive.
pub fn env_filter(settings: &TelemetrySettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter))
}

/// Install the global tracing subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(settings));

    match settings.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| anyhow!(err).context("failed to install tracing subscriber"))?;

    tracing::debug!(
        target: "bookstore-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}
