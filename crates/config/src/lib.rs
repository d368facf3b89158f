//! Process-wide configuration shared by every service client library.
//!
//! A [`Config`] is a table of named fields. Each field carries a default
//! (fixed or computed on every read), a value constraint and a nil policy.
//! Service packages append their own fields, aliases and sub-configurations
//! while they load; afterwards callers only read or override values.

mod credentials;
mod defaults;
mod registry;
mod value;

pub use credentials::{
    credentials_from_env, CredentialSource, Credentials, CREDENTIAL_ENV_VARS, RAW_CREDENTIALS_KEY,
};
pub use defaults::{
    default_credentials, default_project_id, init_defaults, with_defaults, CREDENTIALS_FIELD,
    KEYFILE_ALIAS, PROJECT_ALIAS, PROJECT_ENV_VARS, PROJECT_ID_FIELD,
};
pub use registry::{Config, ConfigError, SharedConfig};
pub use serde_json::Value;
pub use value::{DefaultValue, FieldOptions, Match, ValueKind};

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());
