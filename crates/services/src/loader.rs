use std::{
    collections::HashSet,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use gcloud_config::{ConfigError, SharedConfig};
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    client::ServiceError,
    discovery::PackageIndex,
    manifest::ServiceManifest,
    registry::{FactoryCatalog, ServiceRegistry},
};

/// Outcome of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Canonical paths loaded during this pass, in load order.
    pub loaded: Vec<PathBuf>,
    /// Canonical paths that had already been loaded earlier.
    pub skipped: Vec<PathBuf>,
    /// Services installed during this pass.
    pub services: Vec<String>,
}

/// Loads service manifests at most once each, keyed by canonical path.
pub struct PackageLoader {
    index: Box<dyn PackageIndex>,
    loaded: HashSet<PathBuf>,
}

impl PackageLoader {
    pub fn new(index: impl PackageIndex + 'static) -> Self {
        Self {
            index: Box::new(index),
            loaded: HashSet::new(),
        }
    }

    /// Records `path` as loaded without reading it, e.g. for a manifest whose
    /// service was wired up by hand.
    pub fn mark_loaded(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let canonical = canonicalize(path.as_ref())?;
        self.loaded.insert(canonical);
        Ok(())
    }

    pub fn is_loaded(&self, path: impl AsRef<Path>) -> bool {
        fs::canonicalize(path.as_ref())
            .map(|canonical| self.loaded.contains(&canonical))
            .unwrap_or(false)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Candidate manifests, newest package versions only when the index can
    /// tell versions apart.
    pub fn candidates(&self) -> Result<Vec<PathBuf>, LoadError> {
        let found = match self.index.find_latest_files() {
            Some(latest) => latest,
            None => self.index.find_files(),
        };
        found.map_err(LoadError::Discovery)
    }

    /// Loads every candidate not loaded before, in index order. The first
    /// failure aborts the pass; manifests loaded before it stay loaded.
    pub fn auto_load(
        &mut self,
        config: &SharedConfig,
        catalog: &FactoryCatalog,
        registry: &ServiceRegistry,
    ) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();
        for candidate in self.candidates()? {
            let canonical = canonicalize(&candidate)?;
            if self.loaded.contains(&canonical) {
                debug!(path = %canonical.display(), "service manifest already loaded");
                counter!("gcloud_service_manifests_skipped_total").increment(1);
                report.skipped.push(canonical);
                continue;
            }
            let service = self.load_canonical(&canonical, config, catalog, registry)?;
            report.loaded.push(canonical);
            report.services.push(service);
        }
        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "service package discovery finished"
        );
        Ok(report)
    }

    /// Loads a single manifest. Returns `Ok(None)` if it was loaded before,
    /// otherwise the name of the installed service.
    pub fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        config: &SharedConfig,
        catalog: &FactoryCatalog,
        registry: &ServiceRegistry,
    ) -> Result<Option<String>, LoadError> {
        let canonical = canonicalize(path.as_ref())?;
        if self.loaded.contains(&canonical) {
            return Ok(None);
        }
        self.load_canonical(&canonical, config, catalog, registry)
            .map(Some)
    }

    fn load_canonical(
        &mut self,
        path: &Path,
        config: &SharedConfig,
        catalog: &FactoryCatalog,
        registry: &ServiceRegistry,
    ) -> Result<String, LoadError> {
        let bytes = fs::read(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = ServiceManifest::from_slice(&bytes).map_err(|source| LoadError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

        let factory = catalog
            .get(manifest.factory_name())
            .cloned()
            .ok_or_else(|| LoadError::MissingFactory {
                path: path.to_path_buf(),
                service: manifest.service.clone(),
                factory: manifest.factory_name().to_string(),
            })?;
        if registry.is_installed(&manifest.service) {
            return Err(LoadError::Install {
                path: path.to_path_buf(),
                source: ServiceError::AlreadyInstalled {
                    name: manifest.service.clone(),
                },
            });
        }

        config
            .update(|config| manifest.register(config))
            .map_err(|source| LoadError::Config {
                path: path.to_path_buf(),
                source,
            })?;
        registry
            .install(manifest.service.as_str(), factory)
            .map_err(|source| LoadError::Install {
                path: path.to_path_buf(),
                source,
            })?;

        self.loaded.insert(path.to_path_buf());
        counter!("gcloud_service_manifests_loaded_total").increment(1);
        info!(service = %manifest.service, path = %path.display(), "service package loaded");
        Ok(manifest.service)
    }
}

impl fmt::Debug for PackageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageLoader")
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, LoadError> {
    fs::canonicalize(path).map_err(|source| LoadError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

/// Failures while discovering or loading service packages. None of them is
/// recovered here.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to enumerate service packages: {0}")]
    Discovery(#[source] io::Error),
    #[error("failed to resolve `{}`: {source}", path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed service manifest `{}`: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("service `{service}` in `{}` needs factory `{factory}`, which is not linked", path.display())]
    MissingFactory {
        path: PathBuf,
        service: String,
        factory: String,
    },
    #[error("service manifest `{}` conflicts with the configuration: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
    #[error("cannot install service from `{}`: {source}", path.display())]
    Install {
        path: PathBuf,
        #[source]
        source: ServiceError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::GENERIC_FACTORY, discovery::InstallRoot};
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        config: SharedConfig,
        catalog: FactoryCatalog,
        registry: ServiceRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: TempDir::new().unwrap(),
                config: SharedConfig::default(),
                catalog: FactoryCatalog::with_builtin(),
                registry: ServiceRegistry::new(),
            }
        }

        fn install(&self, package_dir: &str, file: &str, body: &str) -> PathBuf {
            let dir = self.root.path().join(package_dir);
            fs::create_dir_all(&dir).unwrap();
            let path = dir.join(file);
            fs::write(&path, body).unwrap();
            path
        }

        fn loader(&self) -> PackageLoader {
            PackageLoader::new(InstallRoot::new([self.root.path()]))
        }

        fn run(&self, loader: &mut PackageLoader) -> Result<LoadReport, LoadError> {
            loader.auto_load(&self.config, &self.catalog, &self.registry)
        }
    }

    fn manifest(service: &str) -> String {
        json!({
            "service": service,
            "factory": GENERIC_FACTORY,
            "fields": [{ "name": "endpoint", "default": format!("https://{service}.example") }]
        })
        .to_string()
    }

    #[test]
    fn second_pass_loads_nothing_new() {
        let fixture = Fixture::new();
        fixture.install("gcloud-storage-1.0.0", "service-client-storage.json", &manifest("storage"));
        fixture.install("gcloud-pubsub-2.1.0", "service-client-pubsub.json", &manifest("pubsub"));
        let mut loader = fixture.loader();

        let first = fixture.run(&mut loader).unwrap();
        assert_eq!(first.loaded.len(), 2);
        assert!(first.skipped.is_empty());

        let second = fixture.run(&mut loader).unwrap();
        assert!(second.loaded.is_empty());
        assert_eq!(second.skipped.len(), 2);
        assert_eq!(loader.loaded_count(), 2);

        let mut names = fixture.registry.names();
        names.sort();
        assert_eq!(names, vec!["pubsub".to_string(), "storage".to_string()]);
        let endpoint = fixture
            .config
            .read()
            .config("pubsub")
            .unwrap()
            .get("endpoint")
            .unwrap();
        assert_eq!(endpoint, json!("https://pubsub.example"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_candidates_resolve_to_one_load() {
        let fixture = Fixture::new();
        let real = fixture.install("gcloud-storage-1.0.0", "service-client-storage.json", &manifest("storage"));
        let mut loader = fixture.loader();
        fixture.run(&mut loader).unwrap();

        let link_dir = TempDir::new().unwrap();
        let link = link_dir.path().join("service-client-storage.json");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        assert!(loader.is_loaded(&link));
        let again = loader
            .load_file(&link, &fixture.config, &fixture.catalog, &fixture.registry)
            .unwrap();
        assert_eq!(again, None);
    }

    #[test]
    fn marked_files_are_never_loaded() {
        let fixture = Fixture::new();
        let path = fixture.install("gcloud-storage-1.0.0", "service-client-storage.json", &manifest("storage"));
        let mut loader = fixture.loader();
        loader.mark_loaded(&path).unwrap();

        let report = fixture.run(&mut loader).unwrap();
        assert!(report.loaded.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(!fixture.registry.is_installed("storage"));
    }

    #[test]
    fn only_latest_version_is_loaded() {
        let fixture = Fixture::new();
        fixture.install("gcloud-storage-1.0.0", "service-client-storage.json", &manifest("storage"));
        let newest = fixture.install("gcloud-storage-1.1.0", "service-client-storage.json", &manifest("storage"));
        let mut loader = fixture.loader();

        let report = fixture.run(&mut loader).unwrap();
        assert_eq!(report.loaded, vec![fs::canonicalize(newest).unwrap()]);
    }

    #[test]
    fn missing_factory_aborts_without_side_effects() {
        let fixture = Fixture::new();
        fixture.install(
            "gcloud-spanner-1.0.0",
            "service-client-spanner.json",
            r#"{"service":"spanner","fields":[{"name":"instance"}]}"#,
        );
        let mut loader = fixture.loader();

        let err = fixture.run(&mut loader).unwrap_err();
        assert!(matches!(err, LoadError::MissingFactory { ref factory, .. } if factory == "spanner"));
        assert!(fixture.config.read().config("spanner").is_none());
        assert_eq!(loader.loaded_count(), 0);
    }

    #[test]
    fn malformed_manifest_propagates() {
        let fixture = Fixture::new();
        fixture.install("gcloud-broken-0.1.0", "service-client-broken.json", "{ not json");
        let mut loader = fixture.loader();
        assert!(matches!(
            fixture.run(&mut loader),
            Err(LoadError::Manifest { .. })
        ));
    }

    #[test]
    fn conflicting_shared_field_fails_loudly() {
        let fixture = Fixture::new();
        fixture.install(
            "gcloud-storage-1.0.0",
            "service-client-storage.json",
            r#"{"service":"storage","factory":"generic","shared_fields":[{"name":"retries","default":3}]}"#,
        );
        fixture.install(
            "gcloud-pubsub-1.0.0",
            "service-client-pubsub.json",
            r#"{"service":"pubsub","factory":"generic","shared_fields":[{"name":"retries","default":5}]}"#,
        );
        let mut loader = fixture.loader();

        let err = fixture.run(&mut loader).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Config {
                source: ConfigError::DuplicateName { .. },
                ..
            }
        ));
        assert_eq!(loader.loaded_count(), 1);
    }

    #[test]
    fn rejected_manifest_leaves_config_untouched() {
        let fixture = Fixture::new();
        fixture.install(
            "gcloud-storage-1.0.0",
            "service-client-storage.json",
            r#"{"service":"storage","factory":"generic",
                "shared_fields":[{"name":"retries"},{"name":"retries"}]}"#,
        );
        let mut loader = fixture.loader();

        for _ in 0..2 {
            let err = fixture.run(&mut loader).unwrap_err();
            assert!(matches!(
                err,
                LoadError::Config {
                    source: ConfigError::DuplicateName { .. },
                    ..
                }
            ));
            assert_eq!(fixture.config.read().field_names().count(), 0);
        }
        assert_eq!(loader.loaded_count(), 0);
        assert!(!fixture.registry.is_installed("storage"));
    }
}
