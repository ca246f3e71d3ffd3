use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum XrefError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Manifest missing: {0}")]
    ManifestMissing(String),

    #[error("Manifest invalid: {0}")]
    ManifestInvalid(String),

    #[error("Failed to compile {file}: {reason}")]
    CompileFailure { file: String, reason: String },

    #[error("Subprocess `{command}` failed: {stderr}")]
    Subprocess { command: String, stderr: String },

    #[error("Subprocess `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Module {module} not found in {package}")]
    ModuleNotFound { package: String, module: String },

    #[error("Git error: {0}")]
    Git(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Task error: {0}")]
    Task(String),
}

impl XrefError {
    /// Errors that end the current repository pass. Everything else is
    /// scoped to a single file, reference or version.
    pub fn is_repository_fatal(&self) -> bool {
        matches!(
            self,
            XrefError::ManifestMissing(_) | XrefError::ManifestInvalid(_) | XrefError::Git(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, XrefError>;
