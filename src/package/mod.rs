//! Packages, manifests and published versions.
//!
//! This module covers everything the indexer knows about a package without
//! compiling it:
//! - Identity (`owner/name`) and the manifest declared at a checkout
//! - The catalog of versions published for each package
//! - Resolution of version-range expressions against that catalog

pub mod catalog;
pub mod manifest;
pub mod version;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, XrefError};

/// Extension of source files in the target language.
pub const SOURCE_EXTENSION: &str = "elm";

/// Build cache directory created by the compiler inside a checkout.
pub const BUILD_DIR: &str = "elm-stuff";

/// Identity of a package or repository (`owner/name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    pub owner: String,
    pub name: String,
}

impl PackageId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses `owner/name`.
    pub fn parse(full_name: &str) -> Result<Self> {
        match full_name.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(XrefError::Config(format!(
                "invalid package id \"{}\", expected owner/name",
                full_name
            ))),
        }
    }

    /// Whether this is the owner/name the compiler reports for modules of the
    /// package under compilation.
    pub fn is_local_placeholder(&self) -> bool {
        self.owner == "user" && self.name == "project"
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A package as declared by its manifest at one checkout.
#[derive(Debug, Clone)]
pub struct Package {
    pub id: PackageId,
    /// Pinned version; `None` for the repository being imported.
    pub version: Option<String>,
    /// Directory the manifest lives in.
    pub root: PathBuf,
    /// Source directories relative to `root`, in declaration order.
    pub source_directories: Vec<String>,
    pub manifest_path: PathBuf,
}

impl Package {
    /// Loads the package rooted at `root` from its manifest.
    pub fn load(id: PackageId, version: Option<String>, root: &Path) -> Result<Self> {
        let manifest = manifest::Manifest::read(root)?;
        Ok(Self {
            id,
            version,
            root: root.to_path_buf(),
            source_directories: manifest.source_directories,
            manifest_path: manifest.path,
        })
    }

    /// Absolute source directories in declaration order.
    pub fn source_roots(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.source_directories.iter().map(|dir| self.root.join(dir))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.id, version),
            None => write!(f, "{}", self.id),
        }
    }
}

// Re-export commonly used types
pub use catalog::VersionCatalog;
pub use manifest::{Manifest, MANIFEST_NAMES};
pub use version::{SelectionPolicy, VersionRange, VersionRangeResolver};
