use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::env::{hydrate_env_file, optional_var};

static SUBSCRIBER_INSTALLED: OnceCell<()> = OnceCell::new();

/// Logging options for binaries embedding the SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    log_filter: String,
}

impl TelemetryConfig {
    pub const DEFAULT_LOG_FILTER: &'static str = "info";

    /// Loads telemetry knobs from optional environment variables prefixed with
    /// `<PREFIX>_`, e.g. `GCLOUD_LOG_FILTER`. Missing entries fall back to
    /// defaults so binaries do not require extra configuration to boot.
    pub fn from_env(prefix: &str) -> Self {
        let _ = hydrate_env_file();
        let upper = prefix.trim().to_ascii_uppercase();
        let log_filter = optional_var(&format!("{upper}_LOG_FILTER"))
            .unwrap_or_else(|| Self::DEFAULT_LOG_FILTER.to_string());

        Self { log_filter }
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: Self::DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Installs the global tracing subscriber once per process. Later calls are
/// no-ops, so libraries and binaries may both call it.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    if SUBSCRIBER_INSTALLED.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_new(config.log_filter())
        .map_err(|err| TelemetryError::InvalidLogFilter(err.to_string()))?;

    if SUBSCRIBER_INSTALLED.set(()).is_ok() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|err| TelemetryError::Tracing(err.to_string()))?;
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
}
