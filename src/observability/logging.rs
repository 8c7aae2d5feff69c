//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Map the config's numeric verbosity onto a tracing level
//! - Re-apply the level on every successful configuration resolution
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - An explicit `RUST_LOG` pins the filter; config verbosity is then ignored

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Level used until the first configuration is resolved.
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::WARN;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human readable output.
    Pretty,
}

/// Map a numeric verbosity onto a level filter.
///
/// Numbering: 0 panic, 1 fatal, 2 error, 3 warn, 4 info, 5 debug, 6 trace.
/// Panic and fatal have no tracing counterpart and collapse into error.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0..=2 => LevelFilter::ERROR,
        3 => LevelFilter::WARN,
        4 => LevelFilter::INFO,
        5 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Handle for changing the global log level after initialization.
#[derive(Clone)]
pub struct LevelHandle {
    inner: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LevelHandle {
    /// Apply the level derived from `verbosity`, unless `RUST_LOG` pinned it.
    pub fn apply_verbosity(&self, verbosity: u8) {
        if self.pinned {
            return;
        }
        let level = level_for_verbosity(verbosity);
        match self.inner.reload(EnvFilter::new(level.to_string())) {
            Ok(()) => tracing::debug!(verbosity, level = %level, "Log level updated"),
            Err(e) => tracing::warn!(error = %e, "Failed to update log level"),
        }
    }

    /// Whether `RUST_LOG` overrides config verbosity.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}

/// Install the global subscriber and return a handle to its level.
pub fn init(format: LogFormat) -> LevelHandle {
    let (filter, pinned) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(DEFAULT_LEVEL.to_string()), false),
    };
    let (filter, inner) = reload::Layer::new(filter);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    LevelHandle { inner, pinned }
}
