//! Diagnostic source backed by the configured make command.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{anchor_to_cwd, expand_command, CompilerConfig};
use crate::error::{Result, XrefError};
use crate::package::BUILD_DIR;

use super::diagnostic::scrape_references;
use super::process::run_command;
use super::{CompileReport, DiagnosticSource};

const BUILD_ARTIFACTS: &str = "build-artifacts";

pub struct ElmMakeAdapter {
    command: Vec<String>,
    timeout: Duration,
}

impl ElmMakeAdapter {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    /// Relative program paths in the config are taken from the current
    /// directory.
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(anchor_to_cwd(&config.make_command), config.timeout())
    }
}

#[async_trait]
impl DiagnosticSource for ElmMakeAdapter {
    async fn compile(&self, workdir: &Path, file: &str) -> Result<CompileReport> {
        let workdir = std::path::absolute(workdir)?;
        let file_path = workdir.join(file);
        let command = expand_command(&self.command, &workdir, Some(&file_path));

        let output = run_command(&command, &workdir, self.timeout)
            .await
            .map_err(|e| match e {
                XrefError::Subprocess { stderr, .. } => XrefError::CompileFailure {
                    file: file.to_string(),
                    reason: stderr,
                },
                other => other,
            })?;

        Ok(scrape_references(&output, &workdir))
    }

    async fn clear_cache(&self, workdir: &Path) -> Result<()> {
        let artifacts = workdir.join(BUILD_DIR).join(BUILD_ARTIFACTS);
        match tokio::fs::remove_dir_all(&artifacts).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&artifacts).await?;
        Ok(())
    }
}
