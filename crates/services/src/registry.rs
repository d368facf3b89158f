use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use metrics::counter;
use tracing::{debug, info};

use crate::{
    client::{GenericClient, ServiceClient, ServiceError, ServiceFactory, GENERIC_FACTORY},
    settings::ServiceSettings,
};

/// Factories linked into the binary, keyed by the name manifests refer to.
#[derive(Clone, Default)]
pub struct FactoryCatalog {
    factories: BTreeMap<String, ServiceFactory>,
}

impl FactoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with [`GenericClient`] under [`GENERIC_FACTORY`].
    pub fn with_builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(GENERIC_FACTORY, GenericClient::factory());
        catalog
    }

    /// Adds or replaces a factory, returning the one it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: ServiceFactory,
    ) -> Option<ServiceFactory> {
        self.factories.insert(name.into(), factory)
    }

    pub fn get(&self, name: &str) -> Option<&ServiceFactory> {
        self.factories.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for FactoryCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryCatalog")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Service accessors installed by loaded packages. Lookups are by name, so
/// a facade sees services installed after it was created.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<BTreeMap<String, ServiceFactory>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `factory` as the accessor for `name`. A second install under
    /// the same name fails rather than replacing the first.
    pub fn install(&self, name: impl Into<String>, factory: ServiceFactory) -> Result<(), ServiceError> {
        let name = name.into();
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        if services.contains_key(&name) {
            return Err(ServiceError::AlreadyInstalled { name });
        }
        info!(service = %name, "service accessor installed");
        services.insert(name, factory);
        Ok(())
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Builds a client for `name` from already merged settings.
    pub fn connect(
        &self,
        name: &str,
        settings: &ServiceSettings,
    ) -> Result<Arc<dyn ServiceClient>, ServiceError> {
        let factory = self
            .services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownService {
                name: name.to_string(),
            })?;

        debug!(service = name, project_id = ?settings.project_id(), "building service client");
        let client = factory(settings)?;
        counter!("gcloud_service_clients_built_total", "service" => name.to_string()).increment(1);
        Ok(client)
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}
