//! Module resolution
//!
//! Maps a dotted module name of a package to the file defining it. The
//! package root is the checkout itself for the repository being imported,
//! and the install location of the exact version otherwise:
//!
//! ```text
//! <workdir>/elm-stuff/packages/<owner>/<name>/<version>/
//! ```
//!
//! Source directories are tried in manifest declaration order, mirroring how
//! the compiler itself picks between ambiguous roots.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{Result, XrefError};
use crate::package::{Package, PackageId, BUILD_DIR, SOURCE_EXTENSION};

const PACKAGES_DIR: &str = "packages";

/// Location of the file defining a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    /// Root of the package the module belongs to.
    pub package_root: PathBuf,
    /// `/`-separated path relative to `package_root`.
    pub file: String,
}

impl ResolvedModule {
    pub fn absolute_path(&self) -> PathBuf {
        self.package_root.join(&self.file)
    }
}

/// `Foo.Bar` -> `Foo/Bar.elm`
pub fn module_relative_path(module: &str) -> String {
    format!("{}.{}", module.replace('.', "/"), SOURCE_EXTENSION)
}

/// Resolves modules for one repository import.
pub struct ModuleResolver {
    current: PackageId,
    workdir: PathBuf,
    /// `owner/name` -> installed exact version.
    installed: BTreeMap<String, String>,
    packages: Mutex<HashMap<PathBuf, Package>>,
}

impl ModuleResolver {
    pub fn new(current: PackageId, workdir: &Path, installed: BTreeMap<String, String>) -> Self {
        Self {
            current,
            workdir: workdir.to_path_buf(),
            installed,
            packages: Mutex::new(HashMap::new()),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Installed version of a dependency, if any.
    pub fn installed_version(&self, package: &PackageId) -> Option<&str> {
        self.installed.get(&package.full_name()).map(String::as_str)
    }

    /// Root directory of `package` at `version`.
    pub fn package_root(&self, package: &PackageId, version: &str) -> PathBuf {
        self.workdir
            .join(BUILD_DIR)
            .join(PACKAGES_DIR)
            .join(&package.owner)
            .join(&package.name)
            .join(version)
    }

    /// Finds the file defining `module` in `package`.
    ///
    /// For dependencies `version` defaults to the installed one.
    pub fn resolve(
        &self,
        package: &PackageId,
        version: Option<&str>,
        module: &str,
    ) -> Result<ResolvedModule> {
        let (root, pinned) = if package == &self.current {
            (self.workdir.clone(), None)
        } else {
            let version = version
                .or_else(|| self.installed_version(package))
                .ok_or_else(|| XrefError::ModuleNotFound {
                    package: package.full_name(),
                    module: module.to_string(),
                })?;
            (self.package_root(package, version), Some(version.to_string()))
        };

        let loaded = self.load_package(package, pinned, &root)?;
        let candidate = module_relative_path(module);

        for (dir, source_root) in loaded.source_directories.iter().zip(loaded.source_roots()) {
            if source_root.join(&candidate).is_file() {
                return Ok(ResolvedModule {
                    package_root: loaded.root.clone(),
                    file: join_relative(dir, &candidate),
                });
            }
        }

        tracing::debug!(
            "{}: no {} under {:?}",
            loaded,
            candidate,
            loaded.source_directories
        );
        Err(XrefError::ModuleNotFound {
            package: loaded.id.full_name(),
            module: module.to_string(),
        })
    }

    /// Loads the manifest of the package rooted at `root` once per resolver.
    fn load_package(&self, package: &PackageId, version: Option<String>, root: &Path) -> Result<Package> {
        let mut packages = self.packages.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(loaded) = packages.get(root) {
            return Ok(loaded.clone());
        }

        let loaded = Package::load(package.clone(), version, root)?;
        tracing::debug!(
            "{}: source directories {:?} from {}",
            loaded,
            loaded.source_directories,
            loaded.manifest_path.display()
        );
        packages.insert(root.to_path_buf(), loaded.clone());
        Ok(loaded)
    }
}

/// Joins a manifest source directory and a relative module path, dropping
/// `.` segments.
fn join_relative(dir: &str, candidate: &str) -> String {
    dir.split('/')
        .chain(candidate.split('/'))
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}
