use gcloud_core::first_present_var;
use serde_json::Value;

use crate::{
    credentials::{credentials_from_env, Credentials, CREDENTIAL_ENV_VARS},
    registry::{Config, ConfigError},
    value::{DefaultValue, FieldOptions, ValueKind},
};

pub const PROJECT_ID_FIELD: &str = "project_id";
pub const PROJECT_ALIAS: &str = "project";
pub const CREDENTIALS_FIELD: &str = "credentials";
pub const KEYFILE_ALIAS: &str = "keyfile";

/// Project id variables: current name first, legacy name second.
pub const PROJECT_ENV_VARS: [&str; 2] = ["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];

pub fn default_project_id() -> Option<String> {
    first_present_var(&PROJECT_ENV_VARS).map(|(_, value)| value)
}

pub fn default_credentials() -> Option<Credentials> {
    credentials_from_env(&CREDENTIAL_ENV_VARS)
}

/// Registers the top-level fields every service library relies on. Both
/// defaults read the environment lazily, at each read of an unset field.
pub fn init_defaults(config: &mut Config) -> Result<(), ConfigError> {
    config.add_field(
        PROJECT_ID_FIELD,
        DefaultValue::computed(|| default_project_id().map_or(Value::Null, Value::String)),
        FieldOptions::new().matching(ValueKind::String).nullable(),
    )?;
    config.add_alias(PROJECT_ALIAS, PROJECT_ID_FIELD)?;
    config.add_field(
        CREDENTIALS_FIELD,
        DefaultValue::computed(|| {
            default_credentials().map_or(Value::Null, |creds| creds.to_value())
        }),
        FieldOptions::new(),
    )?;
    config.add_alias(KEYFILE_ALIAS, CREDENTIALS_FIELD)?;
    Ok(())
}

pub fn with_defaults() -> Result<Config, ConfigError> {
    let mut config = Config::new();
    init_defaults(&mut config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ENV_GUARD;
    use serde_json::json;
    use std::env;

    fn clear_vars() {
        for var in PROJECT_ENV_VARS.iter().chain(CREDENTIAL_ENV_VARS.iter()) {
            env::remove_var(var);
        }
    }

    #[test]
    fn primary_project_variable_takes_precedence() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_vars();
        env::set_var("GOOGLE_CLOUD_PROJECT", "foo");
        env::set_var("GCLOUD_PROJECT", "bar");

        let config = with_defaults().unwrap();
        assert_eq!(config.get(PROJECT_ID_FIELD).unwrap(), json!("foo"));
        assert_eq!(config.get(PROJECT_ALIAS).unwrap(), json!("foo"));

        env::remove_var("GOOGLE_CLOUD_PROJECT");
        assert_eq!(config.get(PROJECT_ID_FIELD).unwrap(), json!("bar"));
        clear_vars();
    }

    #[test]
    fn missing_project_is_nil_without_error() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_vars();
        let config = with_defaults().unwrap();
        assert_eq!(config.get(PROJECT_ID_FIELD).unwrap(), Value::Null);
    }

    #[test]
    fn missing_credentials_surface_at_read_time() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_vars();
        let config = with_defaults().unwrap();
        assert_eq!(
            config.get(KEYFILE_ALIAS).unwrap_err(),
            ConfigError::NilNotAllowed {
                name: CREDENTIALS_FIELD.into()
            }
        );

        env::set_var("GCLOUD_KEYFILE_JSON", r#"{"type":"service_account"}"#);
        assert_eq!(
            config.get(CREDENTIALS_FIELD).unwrap(),
            json!({"type": "service_account"})
        );
        clear_vars();
    }

    #[test]
    fn explicit_project_overrides_environment_and_must_be_text() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_vars();
        env::set_var("GCLOUD_PROJECT", "from-env");
        let mut config = with_defaults().unwrap();
        config.set(PROJECT_ALIAS, "explicit").unwrap();
        assert_eq!(config.get(PROJECT_ID_FIELD).unwrap(), json!("explicit"));
        assert!(config.set(PROJECT_ID_FIELD, 12).is_err());
        assert_eq!(config.get(PROJECT_ID_FIELD).unwrap(), json!("explicit"));
        clear_vars();
    }

    #[test]
    fn defaults_register_only_once() {
        let mut config = with_defaults().unwrap();
        assert!(matches!(
            init_defaults(&mut config),
            Err(ConfigError::DuplicateName { .. })
        ));
    }
}
