//! Aggregating entry point for the cloud client libraries.
//!
//! [`Cloud`] is the facade handing out per-service clients. Service packages
//! are discovered from `GCLOUD_SERVICE_PATH`, loaded once, and contribute
//! their configuration fields and client factories to a shared [`Context`].
//! The process-wide context is reachable through [`configure`], [`config`]
//! and [`init`]; tests and embedders can build their own with
//! [`Context::new`].

mod context;
mod facade;
pub mod runtime;

use once_cell::sync::OnceCell;
use thiserror::Error;

use gcloud_core::{EnvError, TelemetryError};
use gcloud_services::LoadError;

pub use context::Context;
pub use facade::{Cloud, CloudBuilder};
pub use gcloud_config::{Config, ConfigError, Credentials, SharedConfig, Value};
pub use gcloud_services::{LoadReport, ServiceClient, ServiceError, ServiceSettings};

static GLOBAL_CONTEXT: OnceCell<Context> = OnceCell::new();
static GLOBAL_STARTED: OnceCell<LoadReport> = OnceCell::new();

/// The process-wide context, created on first use with the default fields
/// registered. Package discovery only happens in [`init`].
pub fn global() -> Result<&'static Context, ConfigError> {
    GLOBAL_CONTEXT.get_or_try_init(Context::from_env)
}

/// Mutates the process-wide configuration and returns its handle.
///
/// ```no_run
/// gcloud::configure(|config| config.set("project_id", "my-project"))?;
/// # Ok::<(), gcloud::ConfigError>(())
/// ```
pub fn configure<F>(apply: F) -> Result<SharedConfig, ConfigError>
where
    F: FnOnce(&mut Config) -> Result<(), ConfigError>,
{
    global()?.configure(apply).cloned()
}

/// Handle to the process-wide configuration.
pub fn config() -> Result<SharedConfig, ConfigError> {
    Ok(global()?.config().clone())
}

/// Runs the startup sequence for the process-wide context once: toolchain
/// check, then discovery of every installed service package. Later calls
/// return the first report without doing anything.
pub fn init() -> Result<&'static LoadReport, BootstrapError> {
    let context = global()?;
    GLOBAL_STARTED.get_or_try_init(|| context.start())
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("service package error: {0}")]
    Load(#[from] LoadError),
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
    #[error("environment error: {0}")]
    Env(#[from] EnvError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}
