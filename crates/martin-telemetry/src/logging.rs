//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates raised to debug when `RUST_LOG` is unset. The decision-heavy
/// crates are the ones worth watching cycle by cycle; the HTTP adapters
/// stay at info.
const DEBUG_TARGETS: &[&str] = &["martin_engine", "martin_ledger", "martin_feed"];

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for development.
    Pretty,
    /// One JSON object per line for log shippers.
    Json,
}

impl LogFormat {
    /// Pick the format for a `RUST_ENV` value: JSON in production,
    /// pretty everywhere else.
    pub fn for_env(rust_env: Option<&str>) -> Self {
        match rust_env {
            Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// info everywhere, debug for the decision-heavy crates.
fn default_filter() -> EnvFilter {
    DEBUG_TARGETS
        .iter()
        .filter_map(|target| format!("{target}=debug").parse().ok())
        .fold(EnvFilter::new("info"), EnvFilter::add_directive)
}

/// Initialize structured logging.
///
/// `RUST_LOG` overrides the default filter; `RUST_ENV=production`
/// switches to JSON output. Fails if a subscriber is already set.
pub fn init_logging() -> TelemetryResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());
    let format = LogFormat::for_env(std::env::var("RUST_ENV").ok().as_deref());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    }
    .map_err(|e| TelemetryError::Init(e.to_string()))
}
