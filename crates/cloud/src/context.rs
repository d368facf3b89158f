use std::sync::{Arc, Mutex, PoisonError, RwLock};

use gcloud_config::{with_defaults, Config, ConfigError, SharedConfig};
use gcloud_services::{
    FactoryCatalog, InstallRoot, LoadError, LoadReport, PackageIndex, PackageLoader,
    ServiceFactory, ServiceRegistry,
};
use tracing::info;

use crate::{
    runtime::{warn_on_old_runtime_version, RECOMMENDED_VERSION_THRESHOLD, SUPPORTED_VERSION_THRESHOLD},
    BootstrapError,
};

/// Everything one SDK instance shares: configuration, linked factories,
/// installed services and the loader that installs them. Cheap to clone;
/// clones share state.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    config: SharedConfig,
    catalog: RwLock<FactoryCatalog>,
    services: ServiceRegistry,
    loader: Mutex<PackageLoader>,
}

impl Context {
    /// Fresh context with the default `project_id`/`credentials` fields and
    /// the built-in factories. Nothing is loaded yet.
    pub fn new(index: impl PackageIndex + 'static) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: Arc::new(ContextInner {
                config: SharedConfig::new(with_defaults()?),
                catalog: RwLock::new(FactoryCatalog::with_builtin()),
                services: ServiceRegistry::new(),
                loader: Mutex::new(PackageLoader::new(index)),
            }),
        })
    }

    /// Context discovering packages under `GCLOUD_SERVICE_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(InstallRoot::from_env())
    }

    /// Builds a context, then runs the startup sequence: toolchain check
    /// followed by package discovery.
    pub fn bootstrap(index: impl PackageIndex + 'static) -> Result<Self, BootstrapError> {
        let context = Self::new(index)?;
        context.start()?;
        Ok(context)
    }

    pub(crate) fn start(&self) -> Result<LoadReport, BootstrapError> {
        warn_on_old_runtime_version(SUPPORTED_VERSION_THRESHOLD, RECOMMENDED_VERSION_THRESHOLD);
        let report = self.auto_load_packages()?;
        info!(services = ?report.services, "gcloud context ready");
        Ok(report)
    }

    pub fn config(&self) -> &SharedConfig {
        &self.inner.config
    }

    /// Applies `apply` to the shared configuration and returns its handle.
    pub fn configure<F>(&self, apply: F) -> Result<&SharedConfig, ConfigError>
    where
        F: FnOnce(&mut Config) -> Result<(), ConfigError>,
    {
        self.inner.config.update(apply)?;
        Ok(&self.inner.config)
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.inner.services
    }

    /// Links a factory that manifests can refer to by `name`. Only affects
    /// manifests loaded afterwards.
    pub fn register_factory(&self, name: impl Into<String>, factory: ServiceFactory) {
        self.inner
            .catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(name, factory);
    }

    /// Discovers and loads every service manifest not loaded before.
    pub fn auto_load_packages(&self) -> Result<LoadReport, LoadError> {
        let catalog = self
            .inner
            .catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut loader = self.inner.loader.lock().unwrap_or_else(PoisonError::into_inner);
        loader.auto_load(&self.inner.config, &catalog, &self.inner.services)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
