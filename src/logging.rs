//! Tracing setup for hosts embedding the engine.
//!
//! The engine itself only emits `tracing` events; it never installs a
//! subscriber. Hosts call [`init`] once at startup.
//!
//! ```bash
//! RUST_LOG=vigil=debug my-scanner
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact human-readable lines on stderr
    #[default]
    Compact,
    /// One JSON object per line on stderr
    Json,
}

/// Initialize the global tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. A subscriber that is already
/// installed is left in place.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    let _ = match format {
        LogFormat::Compact => registry
            .with(fmt::layer().with_writer(std::io::stderr).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init(),
    };
}
