use std::{fmt, sync::Arc};

use gcloud_config::ConfigError;
use thiserror::Error;

use crate::settings::ServiceSettings;

/// Name of the built-in factory that produces a [`GenericClient`].
pub const GENERIC_FACTORY: &str = "generic";

/// A configured client for one cloud service. Request logic lives in the
/// service's own crate; this layer only hands it resolved settings.
pub trait ServiceClient: Send + Sync + fmt::Debug {
    fn service_name(&self) -> &str;

    fn settings(&self) -> &ServiceSettings;
}

pub type ServiceFactory =
    Arc<dyn Fn(&ServiceSettings) -> Result<Arc<dyn ServiceClient>, ServiceError> + Send + Sync>;

pub fn factory<F>(build: F) -> ServiceFactory
where
    F: Fn(&ServiceSettings) -> Result<Arc<dyn ServiceClient>, ServiceError> + Send + Sync + 'static,
{
    Arc::new(build)
}

/// Client that carries its settings and nothing else. Useful for services
/// whose crate only needs the merged configuration handed through.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericClient {
    settings: ServiceSettings,
}

impl GenericClient {
    pub fn new(settings: ServiceSettings) -> Self {
        Self { settings }
    }

    pub fn factory() -> ServiceFactory {
        factory(|settings| Ok(Arc::new(GenericClient::new(settings.clone()))))
    }
}

impl ServiceClient for GenericClient {
    fn service_name(&self) -> &str {
        self.settings.service()
    }

    fn settings(&self) -> &ServiceSettings {
        &self.settings
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("service `{service}` setting `{field}` must be {expected}")]
    InvalidSetting {
        service: String,
        field: &'static str,
        expected: &'static str,
    },
    #[error("no service named `{name}` is installed")]
    UnknownService { name: String },
    #[error("service `{name}` is already installed")]
    AlreadyInstalled { name: String },
    #[error("failed to build `{service}` client: {reason}")]
    Build { service: String, reason: String },
}
