//! Building blocks shared by the configuration, service-loading and facade
//! crates: environment access, lenient version parsing and telemetry wiring.

pub mod env;
pub mod telemetry;
pub mod version;

pub use env::{first_present_var, hydrate_env_file, is_var_set, optional_var, EnvError};
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
pub use version::{Version, VersionError};
