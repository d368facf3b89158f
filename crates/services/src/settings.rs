use std::time::Duration;

use gcloud_config::{Config, Credentials, Value, CREDENTIALS_FIELD, PROJECT_ID_FIELD};
use tracing::debug;

use crate::client::ServiceError;

pub const RETRIES_FIELD: &str = "retries";
pub const TIMEOUT_FIELD: &str = "timeout";

/// Values supplied directly by the caller when building a facade. Unset
/// entries fall back to configuration when a service client is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientOptions {
    pub project_id: Option<String>,
    pub credentials: Option<Credentials>,
    pub retries: Option<u32>,
    pub timeout: Option<Duration>,
}

/// Settings handed to a service factory after merging caller values with the
/// service's sub-configuration and the top-level configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    service: String,
    project_id: Option<String>,
    credentials: Option<Credentials>,
    retries: Option<u32>,
    timeout: Option<Duration>,
}

impl ServiceSettings {
    /// Each setting is taken from the first source that has it: `options`,
    /// then `config.<service>.<field>`, then `config.<field>`. Fields nobody
    /// registered are simply absent.
    pub fn resolve(
        service: &str,
        options: &ClientOptions,
        config: &Config,
    ) -> Result<Self, ServiceError> {
        let project_id = match &options.project_id {
            Some(project_id) => Some(project_id.clone()),
            None => lookup(service, config, PROJECT_ID_FIELD)?
                .map(|value| expect_str(service, PROJECT_ID_FIELD, value))
                .transpose()?,
        };

        let credentials = match &options.credentials {
            Some(credentials) => Some(credentials.clone()),
            None => {
                let found = lookup(service, config, CREDENTIALS_FIELD)?;
                if found.is_none() {
                    debug!(service, "no default credentials found");
                }
                found
                    .map(|value| {
                        Credentials::from_value(&value).ok_or(ServiceError::InvalidSetting {
                            service: service.to_string(),
                            field: CREDENTIALS_FIELD,
                            expected: "a keyfile path or JSON object",
                        })
                    })
                    .transpose()?
            }
        };

        let retries = match options.retries {
            Some(retries) => Some(retries),
            None => lookup(service, config, RETRIES_FIELD)?
                .map(|value| {
                    value
                        .as_u64()
                        .and_then(|retries| u32::try_from(retries).ok())
                        .ok_or(ServiceError::InvalidSetting {
                            service: service.to_string(),
                            field: RETRIES_FIELD,
                            expected: "a non-negative integer",
                        })
                })
                .transpose()?,
        };

        let timeout = match options.timeout {
            Some(timeout) => Some(timeout),
            None => lookup(service, config, TIMEOUT_FIELD)?
                .map(|value| {
                    value
                        .as_f64()
                        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                        .ok_or(ServiceError::InvalidSetting {
                            service: service.to_string(),
                            field: TIMEOUT_FIELD,
                            expected: "a non-negative number of seconds",
                        })
                })
                .transpose()?,
        };

        Ok(Self {
            service: service.to_string(),
            project_id,
            credentials,
            retries,
            timeout,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn retries(&self) -> Option<u32> {
        self.retries
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

fn lookup(service: &str, config: &Config, field: &str) -> Result<Option<Value>, ServiceError> {
    if let Some(scoped) = config.config(service) {
        if scoped.has_field(field) {
            if let Some(value) = scoped.get_opt(field)? {
                return Ok(Some(value));
            }
        }
    }
    if config.has_field(field) {
        return Ok(config.get_opt(field)?);
    }
    Ok(None)
}

fn expect_str(service: &str, field: &'static str, value: Value) -> Result<String, ServiceError> {
    match value {
        Value::String(text) => Ok(text),
        _ => Err(ServiceError::InvalidSetting {
            service: service.to_string(),
            field,
            expected: "a string",
        }),
    }
}
