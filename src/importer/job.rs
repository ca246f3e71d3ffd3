//! One repository import.
//!
//! A job clones or refreshes the repository into its working directory,
//! resolves reference edges at HEAD, replays the history for dependency
//! intervals, and hands both to the graph store. Failures of either pass are
//! logged and leave that pass empty; only a failed clone or store write fails
//! the job.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::compiler::process::run_command;
use crate::compiler::DiagnosticSource;
use crate::config::{anchor_to_cwd, expand_command, XrefConfig};
use crate::error::{Result, XrefError};
use crate::history::{DependencyIntervalExtractor, GitRepository, RepoHistory};
use crate::indexer::{ModuleNameCache, ModuleResolver, ReferenceAssembler, ReferenceCrawler, SourceWalker};
use crate::package::manifest::read_exact_dependencies;
use crate::package::{Manifest, PackageId, VersionRangeResolver};
use crate::store::{GraphStore, Reference, RepoMetadata};

/// What one import produced.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub references: usize,
    pub edges: usize,
    pub history_skipped: bool,
    pub duration: Duration,
}

/// Unit of work run by the import pool.
#[async_trait]
pub trait RepositoryJob: Send + Sync {
    async fn run(&self, repo: RepoMetadata) -> Result<ImportSummary>;
}

/// Reference resolution over one checkout: install, crawl, assemble.
pub struct ReferencePass {
    config: Arc<XrefConfig>,
    source: Arc<dyn DiagnosticSource>,
    modules: Arc<ModuleNameCache>,
}

impl ReferencePass {
    pub fn new(
        config: Arc<XrefConfig>,
        source: Arc<dyn DiagnosticSource>,
        modules: Arc<ModuleNameCache>,
    ) -> Self {
        Self {
            config,
            source,
            modules,
        }
    }

    /// Crawls and assembles the references of `repo` checked out at
    /// `workdir` on `commit`.
    pub async fn run(&self, repo: &PackageId, workdir: &Path, commit: &str) -> Result<Vec<Reference>> {
        let workdir = std::path::absolute(workdir)?;
        let workdir = workdir.as_path();

        let manifest = Manifest::read(workdir)?;
        let language = semver::Version::parse(&self.config.compiler.language_version).map_err(|e| {
            XrefError::Config(format!(
                "invalid compiler.language_version \"{}\": {}",
                self.config.compiler.language_version, e
            ))
        })?;
        manifest.check_language_version(&language)?;

        if !self.config.compiler.install_command.is_empty() {
            let install = expand_command(
                &anchor_to_cwd(&self.config.compiler.install_command),
                workdir,
                None,
            );
            if let Err(e) = run_command(&install, workdir, self.config.compiler.timeout()).await {
                tracing::warn!("{}: dependency install reported: {}", repo, e);
            }
        }
        let installed = read_exact_dependencies(workdir)?;

        let files = SourceWalker::new().walk(workdir)?;
        tracing::debug!("{}: {} source file(s)", repo, files.len());

        let crawl = ReferenceCrawler::new(self.source.as_ref())
            .crawl(workdir, files)
            .await?;
        if !crawl.failed.is_empty() {
            tracing::info!("{}: {} file(s) failed to compile", repo, crawl.failed.len());
        }

        let resolver = ModuleResolver::new(repo.clone(), workdir, installed);
        let assembler = ReferenceAssembler::new(
            repo.clone(),
            commit,
            self.config.github.host.clone(),
            &resolver,
            &self.modules,
        );
        Ok(assembler.assemble(&crawl.references))
    }
}

pub struct Importer {
    config: Arc<XrefConfig>,
    references: ReferencePass,
    resolver: VersionRangeResolver,
    modules: Arc<ModuleNameCache>,
    store: Arc<dyn GraphStore>,
}

impl Importer {
    pub fn new(
        config: Arc<XrefConfig>,
        source: Arc<dyn DiagnosticSource>,
        resolver: VersionRangeResolver,
        modules: Arc<ModuleNameCache>,
        store: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            references: ReferencePass::new(Arc::clone(&config), source, Arc::clone(&modules)),
            config,
            resolver,
            modules,
            store,
        }
    }

    /// Working directory slot of `repo`.
    pub fn workdir_for(&self, repo: &PackageId) -> PathBuf {
        self.config
            .paths
            .repos_dir
            .join(&repo.owner)
            .join(&repo.name)
    }

    pub fn clone_url(&self, repo: &PackageId) -> String {
        format!(
            "{}/{}/{}",
            self.config.github.host.trim_end_matches('/'),
            repo.owner,
            repo.name
        )
    }

    /// Imports one repository end to end. The working directory slot is
    /// emptied afterwards on every path.
    pub async fn import(&self, meta: &RepoMetadata) -> Result<ImportSummary> {
        let started = Instant::now();
        let id = meta.id();
        let workdir = std::path::absolute(self.workdir_for(&id))?;
        tracing::info!("{}: importing", id);

        self.modules.invalidate_under(&workdir);
        let result = self.import_into(meta, &workdir).await;
        self.cleanup(&workdir).await;

        let mut summary = result?;
        summary.duration = started.elapsed();
        tracing::info!(
            "{} successfully imported {} reference(s) and {} dependency interval(s) in {:.1} second(s)",
            id,
            summary.references,
            summary.edges,
            summary.duration.as_secs_f64()
        );
        Ok(summary)
    }

    async fn import_into(&self, meta: &RepoMetadata, workdir: &Path) -> Result<ImportSummary> {
        let id = meta.id();
        let url = self.clone_url(&id);
        let clone_path = workdir.to_path_buf();
        let repo = tokio::task::spawn_blocking(move || GitRepository::clone_or_pull(&url, &clone_path))
            .await
            .map_err(|e| XrefError::Task(format!("clone task: {}", e)))??;
        let head = repo.head()?;

        let references = match self.resolve_references(&id, workdir, &head).await {
            Ok(references) => references,
            Err(e) => {
                tracing::warn!("{}: reference resolution failed: {}", id, e);
                Vec::new()
            }
        };

        let history = match self.extract_history(&id, repo).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("{}: dependency history failed: {}", id, e);
                RepoHistory::default()
            }
        };

        if let Some(dir) = &self.config.paths.references_dir {
            if let Err(e) = dump_references(dir, &id, &references).await {
                tracing::warn!("{}: couldn't write reference dump: {}", id, e);
            }
        }

        let (references, edges) = self.persist(meta, &references, &history).await?;
        Ok(ImportSummary {
            references,
            edges,
            history_skipped: history.skipped,
            duration: Duration::ZERO,
        })
    }

    /// Crawls and assembles the references of the checkout at `workdir`.
    pub async fn resolve_references(
        &self,
        repo: &PackageId,
        workdir: &Path,
        commit: &str,
    ) -> Result<Vec<Reference>> {
        self.references.run(repo, workdir, commit).await
    }

    async fn extract_history(&self, id: &PackageId, mut repo: GitRepository) -> Result<RepoHistory> {
        let extractor =
            DependencyIntervalExtractor::new(self.resolver.clone(), self.config.workers.max_commits);
        let owner = id.clone();

        tokio::task::spawn_blocking(move || {
            repo.with_restored_checkout(|repo| extractor.extract(&owner, repo))
        })
        .await
        .map_err(|e| XrefError::Task(format!("history task: {}", e)))?
    }

    /// Stores one import; returns the stored reference and interval counts.
    async fn persist(
        &self,
        meta: &RepoMetadata,
        references: &[Reference],
        history: &RepoHistory,
    ) -> Result<(usize, usize)> {
        let store = Arc::clone(&self.store);
        let meta = meta.clone();
        let references = references.to_vec();
        let edges = history.edges.clone();
        let timestamps = history.timestamps;

        tokio::task::spawn_blocking(move || -> Result<(usize, usize)> {
            let mut session = store.session()?;
            let repo = meta.id().full_name();
            session.upsert_repository(&meta, &timestamps)?;
            let references = session.replace_references(&repo, &references)?;
            let edges = session.replace_dependency_edges(&repo, &edges)?;
            Ok((references, edges))
        })
        .await
        .map_err(|e| XrefError::Task(format!("store task: {}", e)))?
    }

    /// Empties the working directory slot.
    async fn cleanup(&self, workdir: &Path) {
        match tokio::fs::remove_dir_all(workdir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Couldn't empty {}: {}", workdir.display(), e),
        }
        self.modules.invalidate_under(workdir);
    }

    async fn mark_imported(&self, repo: &PackageId) -> Result<()> {
        let store = Arc::clone(&self.store);
        let repo = repo.full_name();
        tokio::task::spawn_blocking(move || store.session()?.mark_imported(&repo))
            .await
            .map_err(|e| XrefError::Task(format!("store task: {}", e)))?
    }
}

#[async_trait]
impl RepositoryJob for Importer {
    async fn run(&self, repo: RepoMetadata) -> Result<ImportSummary> {
        let result = self.import(&repo).await;

        // Marked regardless of outcome so a broken repository isn't retried
        // on every run.
        if let Err(e) = self.mark_imported(&repo.id()).await {
            tracing::error!("{}: couldn't mark as imported: {}", repo.id(), e);
        }

        result
    }
}

/// Writes `<owner>_<name>.json` with the references of one import.
pub async fn dump_references(dir: &Path, repo: &PackageId, references: &[Reference]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}_{}.json", repo.owner, repo.name));
    let json = serde_json::to_string_pretty(references)?;
    tokio::fs::write(&path, json).await?;
    Ok(path)
}
