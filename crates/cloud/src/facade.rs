use std::{sync::Arc, time::Duration};

use gcloud_config::Credentials;
use gcloud_services::{ClientOptions, ServiceClient, ServiceError, ServiceSettings};

use crate::{context::Context, global};

/// Entry point for building service clients.
///
/// Caller-supplied values are stored as given; nothing is validated or
/// merged with configuration until a service client is requested.
///
/// ```no_run
/// let cloud = gcloud::Cloud::builder().project_id("my-project").retries(5).build();
/// let storage = cloud.service("storage")?;
/// # Ok::<(), gcloud_services::ServiceError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cloud {
    options: ClientOptions,
    context: Option<Context>,
}

impl Cloud {
    /// Facade with an optional project and credentials. Use [`Cloud::builder`]
    /// to also pass `retries` and `timeout`.
    pub fn new(project_id: Option<String>, credentials: Option<Credentials>) -> Self {
        Self::builder()
            .maybe_project_id(project_id)
            .maybe_credentials(credentials)
            .build()
    }

    pub fn builder() -> CloudBuilder {
        CloudBuilder::default()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.options.project_id.as_deref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.options.credentials.as_ref()
    }

    pub fn retries(&self) -> Option<u32> {
        self.options.retries
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.options.timeout
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The context this facade was bound to, or the process-wide one.
    pub fn context(&self) -> Result<Context, ServiceError> {
        match &self.context {
            Some(context) => Ok(context.clone()),
            None => Ok(global()?.clone()),
        }
    }

    /// Names of the services currently installed in the context.
    pub fn services(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.context()?.services().names())
    }

    /// Settings `service` would be built with right now.
    pub fn settings(&self, service: &str) -> Result<ServiceSettings, ServiceError> {
        let context = self.context()?;
        let config = context.config().read();
        ServiceSettings::resolve(service, &self.options, &config)
    }

    /// Builds a client for an installed service.
    pub fn service(&self, name: &str) -> Result<Arc<dyn ServiceClient>, ServiceError> {
        let context = self.context()?;
        if !context.services().is_installed(name) {
            return Err(ServiceError::UnknownService {
                name: name.to_string(),
            });
        }
        let settings = {
            let config = context.config().read();
            ServiceSettings::resolve(name, &self.options, &config)?
        };
        context.services().connect(name, &settings)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CloudBuilder {
    options: ClientOptions,
    context: Option<Context>,
}

impl CloudBuilder {
    pub fn project_id(self, project_id: impl Into<String>) -> Self {
        self.maybe_project_id(Some(project_id.into()))
    }

    pub fn maybe_project_id(mut self, project_id: Option<String>) -> Self {
        self.options.project_id = project_id;
        self
    }

    pub fn credentials(self, credentials: impl Into<Credentials>) -> Self {
        self.maybe_credentials(Some(credentials.into()))
    }

    pub fn maybe_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.options.credentials = credentials;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.options.retries = Some(retries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Binds the facade to `context` instead of the process-wide one.
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Cloud {
        Cloud {
            options: self.options,
            context: self.context,
        }
    }
}
