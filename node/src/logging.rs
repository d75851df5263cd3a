//! # Structured Logging
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` (with `RUST_LOG`
//! taking precedence over the configured default) and either a pretty or a
//! JSON formatter.
//!
//! Output goes to stderr so stdout stays free for `init` and `version`.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output for local development.
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
}

/// Installs the global subscriber. Call once, early in `main()`.
///
/// `default_filter` uses `EnvFilter` directive syntax, for example
/// `sable_node=debug,sable_protocol=info,tower_http=debug`.
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .init();
        }
    }

    tracing::debug!(?format, "logging initialized");
}
