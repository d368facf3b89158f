//! Locating installed service packages on disk.
//!
//! An install root holds one directory per installed package version, named
//! `<package>-<version>` (for example `gcloud-storage-1.4.0`). Each package
//! contributes its top-level `service-client-*.json` manifests.

use std::{env, fs, io, path::PathBuf};

use gcloud_core::Version;
use tracing::debug;

/// Path list (platform `PATH` syntax) of install roots.
pub const SERVICE_PATH_VAR: &str = "GCLOUD_SERVICE_PATH";

pub const CLIENT_FILE_PREFIX: &str = "service-client-";
pub const CLIENT_FILE_SUFFIX: &str = ".json";

/// Source of candidate manifest files.
pub trait PackageIndex: Send + Sync {
    /// Manifests from every installed version of every package.
    fn find_files(&self) -> io::Result<Vec<PathBuf>>;

    /// Manifests from the newest installed version of each package, or
    /// `None` when the index cannot tell versions apart.
    fn find_latest_files(&self) -> Option<io::Result<Vec<PathBuf>>> {
        None
    }
}

pub fn is_client_file(file_name: &str) -> bool {
    file_name.len() > CLIENT_FILE_PREFIX.len() + CLIENT_FILE_SUFFIX.len()
        && file_name.starts_with(CLIENT_FILE_PREFIX)
        && file_name.ends_with(CLIENT_FILE_SUFFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: Option<Version>,
    pub dir: PathBuf,
}

impl InstalledPackage {
    /// Splits `<package>-<version>`; names without a parseable version
    /// suffix are kept whole with no version.
    pub fn from_dir(dir: PathBuf) -> Option<Self> {
        let dir_name = dir.file_name()?.to_str()?.to_string();
        let split = dir_name.rsplit_once('-').and_then(|(name, version)| {
            let starts_numeric = version.starts_with(|c: char| c.is_ascii_digit());
            match Version::parse(version) {
                Ok(version) if starts_numeric && !name.is_empty() => {
                    Some((name.to_string(), Some(version)))
                }
                _ => None,
            }
        });
        let (name, version) = split.unwrap_or((dir_name, None));
        Some(Self { name, version, dir })
    }

    pub fn client_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let is_match = entry.file_name().to_str().is_some_and(is_client_file);
            if is_match && entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

/// Directory-based [`PackageIndex`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallRoot {
    roots: Vec<PathBuf>,
}

impl InstallRoot {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads roots from [`SERVICE_PATH_VAR`]; unset means no roots.
    pub fn from_env() -> Self {
        let roots = env::var_os(SERVICE_PATH_VAR)
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Installed packages in root order, then directory listing order.
    pub fn packages(&self) -> io::Result<Vec<InstalledPackage>> {
        let mut packages = Vec::new();
        for root in &self.roots {
            if !root.is_dir() {
                debug!(root = %root.display(), "skipping missing install root");
                continue;
            }
            for entry in fs::read_dir(root)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                if let Some(package) = InstalledPackage::from_dir(entry.path()) {
                    packages.push(package);
                }
            }
        }
        Ok(packages)
    }

    fn files_of(packages: &[InstalledPackage]) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for package in packages {
            files.extend(package.client_files()?);
        }
        Ok(files)
    }
}

impl PackageIndex for InstallRoot {
    fn find_files(&self) -> io::Result<Vec<PathBuf>> {
        Self::files_of(&self.packages()?)
    }

    fn find_latest_files(&self) -> Option<io::Result<Vec<PathBuf>>> {
        Some(self.packages().and_then(|packages| {
            let latest = latest_versions(packages);
            Self::files_of(&latest)
        }))
    }
}

/// Keeps the newest version of each package name, in first-seen order.
/// Unversioned directories lose to any versioned one.
fn latest_versions(packages: Vec<InstalledPackage>) -> Vec<InstalledPackage> {
    let mut latest: Vec<InstalledPackage> = Vec::new();
    for package in packages {
        match latest.iter_mut().find(|kept| kept.name == package.name) {
            Some(kept) if package.version > kept.version => *kept = package,
            Some(_) => {}
            None => latest.push(package),
        }
    }
    latest
}
