//! Configuration file support.
//!
//! The indexer reads an optional `xref-indexer.yml` from the working
//! directory. Every section falls back to its defaults, so a partial file
//! only overrides what it names:
//!
//! ```yaml
//! workers:
//!   concurrency: 8
//! compiler:
//!   timeout_secs: 120
//! catalog:
//!   source: https://package.elm-lang.org/all-packages
//!   selection: highest
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XrefError};
use crate::package::SelectionPolicy;

/// Name of the config file looked up when no path is given.
pub const CONFIG_FILENAME: &str = "xref-indexer.yml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefConfig {
    pub workers: WorkerConfig,
    pub compiler: CompilerConfig,
    pub paths: PathConfig,
    pub catalog: CatalogConfig,
    pub github: GithubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of repositories imported at the same time.
    pub concurrency: usize,
    /// Repositories with more commits are not walked for dependency history.
    pub max_commits: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_commits: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compiles one file. `{workdir}` and `{file}` are substituted.
    pub make_command: Vec<String>,
    /// Installs the dependencies of a checkout. `{workdir}` is substituted.
    pub install_command: Vec<String>,
    pub timeout_secs: u64,
    /// Language version the compiler implements; checked against `elm-version`.
    pub language_version: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            make_command: vec![
                "lib/make.sh".to_string(),
                "{workdir}".to_string(),
                "{file}".to_string(),
            ],
            install_command: vec!["lib/install.sh".to_string(), "{workdir}".to_string()],
            timeout_secs: 300,
            language_version: "0.18.0".to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub repos_dir: PathBuf,
    pub references_dir: Option<PathBuf>,
    pub database: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            repos_dir: PathBuf::from("_repos"),
            references_dir: None,
            database: PathBuf::from("xref.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// File path or http(s) URL of the published package list.
    pub source: String,
    pub selection: SelectionPolicy,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source: "http://package.elm-lang.org/all-packages".to_string(),
            selection: SelectionPolicy::Highest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub host: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            host: "https://github.com".to_string(),
        }
    }
}

impl XrefConfig {
    /// Parses a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: XrefConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers.concurrency == 0 {
            return Err(XrefError::Config(
                "workers.concurrency must be at least 1".to_string(),
            ));
        }
        if self.compiler.make_command.is_empty() {
            return Err(XrefError::Config(
                "compiler.make_command must not be empty".to_string(),
            ));
        }
        if self.compiler.timeout_secs == 0 {
            return Err(XrefError::Config(
                "compiler.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replaces `{workdir}` / `{file}` placeholders in a configured command.
pub fn expand_command(template: &[String], workdir: &Path, file: Option<&Path>) -> Vec<String> {
    let workdir = workdir.to_string_lossy();
    let file = file.map(|f| f.to_string_lossy().into_owned()).unwrap_or_default();
    template
        .iter()
        .map(|part| part.replace("{workdir}", &workdir).replace("{file}", &file))
        .collect()
}

/// Makes a relative program path such as `lib/make.sh` absolute against
/// `base`. Commands run from inside a checkout, so a relative program would
/// otherwise be looked up there. Bare names are left to `PATH` lookup.
pub fn anchor_program(command: &[String], base: &Path) -> Vec<String> {
    let mut anchored = command.to_vec();
    if let Some(program) = anchored.first_mut() {
        let path = Path::new(program.as_str());
        if path.is_relative() && path.components().count() > 1 {
            let absolute = base.join(path).to_string_lossy().into_owned();
            *program = absolute;
        }
    }
    anchored
}

/// [`anchor_program`] against the directory the indexer runs from.
pub fn anchor_to_cwd(command: &[String]) -> Vec<String> {
    match std::env::current_dir() {
        Ok(cwd) => anchor_program(command, &cwd),
        Err(e) => {
            tracing::warn!("Couldn't read the current directory: {}", e);
            command.to_vec()
        }
    }
}
