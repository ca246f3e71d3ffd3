//! Package manifest reader.
//!
//! Two schemas are accepted. `elm-package.json` (0.18):
//!
//! ```json
//! {
//!     "version": "1.0.0",
//!     "source-directories": ["src"],
//!     "dependencies": { "elm-lang/core": "5.0.0 <= v < 6.0.0" },
//!     "elm-version": "0.18.0 <= v < 0.19.0"
//! }
//! ```
//!
//! and `elm.json`, whose `dependencies` is either a flat range map (packages)
//! or split into `direct` / `indirect` exact versions (applications).

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::Deserialize;

use crate::error::{Result, XrefError};

use super::version::VersionRange;
use super::BUILD_DIR;

/// Manifest file names, in lookup order.
pub const MANIFEST_NAMES: [&str; 2] = ["elm-package.json", "elm.json"];

/// Installed dependency versions written by the install step.
const EXACT_DEPENDENCIES: &str = "exact-dependencies.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub version: Option<String>,
    pub elm_version: Option<String>,
    /// Relative source directories in declaration order.
    pub source_directories: Vec<String>,
    /// Dependency id (`owner/name`) to version-range expression.
    pub dependencies: BTreeMap<String, String>,
    pub path: PathBuf,
}

impl Manifest {
    /// Returns the first manifest file present in `root`.
    pub fn find(root: &Path) -> Option<PathBuf> {
        MANIFEST_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
    }

    /// Reads the manifest of the package rooted at `root`.
    pub fn read(root: &Path) -> Result<Self> {
        let path = Self::find(root).ok_or_else(|| {
            XrefError::ManifestMissing(format!("no {} in {}", MANIFEST_NAMES.join(" or "), root.display()))
        })?;
        let content = fs::read_to_string(&path)?;
        Self::parse(&content, &path)
    }

    /// Like [`Manifest::read`], but treats a missing or unparsable manifest as
    /// absent. Other IO failures are still errors.
    pub fn read_optional(root: &Path) -> Result<Option<Self>> {
        match Self::read(root) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(XrefError::ManifestMissing(_)) => Ok(None),
            Err(XrefError::ManifestInvalid(reason)) => {
                tracing::warn!("Ignoring unparsable manifest in {}: {}", root.display(), reason);
                Ok(None)
            }
            Err(XrefError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Parses manifest content. `path` selects schema defaults.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(content).map_err(|e| {
            XrefError::ManifestInvalid(format!("{}: {}", path.display(), e))
        })?;

        let is_legacy = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n == MANIFEST_NAMES[0]);

        let source_directories = match raw.source_directories {
            Some(dirs) if !dirs.is_empty() => dirs,
            _ if is_legacy => vec![".".to_string()],
            _ => vec!["src".to_string()],
        };

        let dependencies = match raw.dependencies {
            Some(DependencyTable::Flat(deps)) => deps,
            Some(DependencyTable::Split { direct, indirect }) => {
                let mut deps = indirect;
                deps.extend(direct);
                deps
            }
            None => BTreeMap::new(),
        };

        Ok(Self {
            version: raw.version,
            elm_version: raw.elm_version,
            source_directories,
            dependencies,
            path: path.to_path_buf(),
        })
    }

    /// Checks that the compiler's language version satisfies `elm-version`.
    /// A manifest without the field is accepted.
    pub fn check_language_version(&self, compiler: &Version) -> Result<()> {
        let Some(required) = self.elm_version.as_deref() else {
            return Ok(());
        };

        let accepted = match VersionRange::parse(required) {
            Some(range) => range.contains(compiler),
            None => match Version::parse(required.trim()) {
                Ok(exact) => &exact == compiler,
                Err(_) => {
                    return Err(XrefError::ManifestInvalid(format!(
                        "couldn't parse elm-version: \"{}\"",
                        required
                    )))
                }
            },
        };

        if accepted {
            Ok(())
        } else {
            Err(XrefError::ManifestInvalid(format!(
                "current version \"{}\" doesn't match required version \"{}\"",
                compiler, required
            )))
        }
    }
}

/// Reads the `owner/name -> version` map produced by installing the
/// dependencies of the checkout at `workdir`. Missing file means nothing is
/// installed.
pub fn read_exact_dependencies(workdir: &Path) -> Result<BTreeMap<String, String>> {
    let path = workdir.join(BUILD_DIR).join(EXACT_DEPENDENCIES);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content)
        .map_err(|e| XrefError::ManifestInvalid(format!("{}: {}", path.display(), e)))
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    version: Option<String>,
    #[serde(rename = "source-directories")]
    source_directories: Option<Vec<String>>,
    dependencies: Option<DependencyTable>,
    #[serde(rename = "elm-version")]
    elm_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DependencyTable {
    Flat(BTreeMap<String, String>),
    Split {
        #[serde(default)]
        direct: BTreeMap<String, String>,
        #[serde(default)]
        indirect: BTreeMap<String, String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_legacy_manifest() {
        let content = r#"
{
    "version": "1.0.0",
    "summary": "helpful summary",
    "source-directories": ["src", "vendor"],
    "exposed-modules": [],
    "dependencies": {
        "elm-lang/core": "5.1.1 <= v < 6.0.0",
        "elm-lang/html": "2.0.0 <= v < 3.0.0"
    },
    "elm-version": "0.18.0 <= v < 0.19.0"
}
"#;
        let manifest = Manifest::parse(content, Path::new("elm-package.json")).unwrap();

        assert_eq!(manifest.version.as_deref(), Some("1.0.0"));
        assert_eq!(manifest.source_directories, vec!["src", "vendor"]);
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.dependencies["elm-lang/core"], "5.1.1 <= v < 6.0.0");
    }

    #[test]
    fn test_parse_application_elm_json() {
        let content = r#"
{
    "type": "application",
    "source-directories": ["src"],
    "elm-version": "0.19.1",
    "dependencies": {
        "direct": { "elm/core": "1.0.5" },
        "indirect": { "elm/json": "1.1.3" }
    }
}
"#;
        let manifest = Manifest::parse(content, Path::new("elm.json")).unwrap();

        assert_eq!(manifest.dependencies["elm/core"], "1.0.5");
        assert_eq!(manifest.dependencies["elm/json"], "1.1.3");
    }

    #[test]
    fn test_package_elm_json_defaults_to_src() {
        let content = r#"{ "type": "package", "version": "2.0.0", "dependencies": {} }"#;
        let manifest = Manifest::parse(content, Path::new("elm.json")).unwrap();
        assert_eq!(manifest.source_directories, vec!["src"]);
    }

    #[test]
    fn test_invalid_json_is_manifest_invalid() {
        let err = Manifest::parse("{ not json", Path::new("elm-package.json")).unwrap_err();
        assert!(matches!(err, XrefError::ManifestInvalid(_)));
    }

    #[test]
    fn test_read_prefers_legacy_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("elm-package.json"),
            r#"{ "source-directories": ["legacy"] }"#,
        )
        .unwrap();
        fs::write(dir.path().join("elm.json"), r#"{ "source-directories": ["new"] }"#).unwrap();

        let manifest = Manifest::read(dir.path()).unwrap();
        assert_eq!(manifest.source_directories, vec!["legacy"]);
    }

    #[test]
    fn test_read_missing_and_optional() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Manifest::read(dir.path()),
            Err(XrefError::ManifestMissing(_))
        ));
        assert!(Manifest::read_optional(dir.path()).unwrap().is_none());

        fs::write(dir.path().join("elm-package.json"), "{{{").unwrap();
        assert!(Manifest::read_optional(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_check_language_version() {
        let manifest = Manifest::parse(
            r#"{ "elm-version": "0.18.0 <= v < 0.19.0" }"#,
            Path::new("elm-package.json"),
        )
        .unwrap();

        assert!(manifest.check_language_version(&Version::new(0, 18, 0)).is_ok());
        assert!(manifest.check_language_version(&Version::new(0, 19, 0)).is_err());
    }

    #[test]
    fn test_check_language_version_exact() {
        let manifest =
            Manifest::parse(r#"{ "elm-version": "0.19.1" }"#, Path::new("elm.json")).unwrap();

        assert!(manifest.check_language_version(&Version::new(0, 19, 1)).is_ok());
        assert!(manifest.check_language_version(&Version::new(0, 18, 0)).is_err());
    }

    #[test]
    fn test_read_exact_dependencies() {
        let dir = TempDir::new().unwrap();
        assert!(read_exact_dependencies(dir.path()).unwrap().is_empty());

        fs::create_dir_all(dir.path().join(BUILD_DIR)).unwrap();
        fs::write(
            dir.path().join(BUILD_DIR).join(EXACT_DEPENDENCIES),
            r#"{ "elm-lang/core": "5.1.1", "elm-lang/html": "2.0.0" }"#,
        )
        .unwrap();

        let deps = read_exact_dependencies(dir.path()).unwrap();
        assert_eq!(deps["elm-lang/core"], "5.1.1");
    }
}
