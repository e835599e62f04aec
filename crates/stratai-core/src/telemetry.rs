use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

use crate::StratAiError;
use crate::config::LoggingConfig;

static SUBSCRIBER_INSTALLED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_level: String,
    pub with_ansi: bool,
    pub with_target: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self::from_logging(&LoggingConfig::default())
    }
}

impl TelemetryOptions {
    pub fn from_logging(logging: &LoggingConfig) -> Self {
        Self {
            default_level: logging.level.clone(),
            with_ansi: true,
            with_target: false,
        }
    }

    /// `RUST_LOG` wins over the configured level; an unparsable level falls
    /// back to `info`.
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global fmt subscriber. Later calls are no-ops.
pub fn init_telemetry(options: TelemetryOptions) -> Result<(), StratAiError> {
    if SUBSCRIBER_INSTALLED.get().is_some() {
        return Ok(());
    }

    fmt::Subscriber::builder()
        .with_env_filter(options.env_filter())
        .with_ansi(options.with_ansi)
        .with_target(options.with_target)
        .try_init()
        .map_err(|err| {
            StratAiError::InvalidConfiguration(format!("tracing subscriber setup failed: {err}"))
        })?;

    SUBSCRIBER_INSTALLED.get_or_init(|| ());
    Ok(())
}
