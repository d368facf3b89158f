//! Service packages: discovery of installed client manifests, one-time
//! loading into the shared configuration, and the name-keyed registry the
//! facade uses to build per-service clients.

pub mod client;
pub mod discovery;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod settings;

pub use client::{factory, GenericClient, ServiceClient, ServiceError, ServiceFactory, GENERIC_FACTORY};
pub use discovery::{InstallRoot, InstalledPackage, PackageIndex, SERVICE_PATH_VAR};
pub use loader::{LoadError, LoadReport, PackageLoader};
pub use manifest::{FieldManifest, ServiceManifest};
pub use registry::{FactoryCatalog, ServiceRegistry};
pub use settings::{ClientOptions, ServiceSettings};
