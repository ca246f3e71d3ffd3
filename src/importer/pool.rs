//! Bounded parallel import of many repositories.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::error::Result;
use crate::store::RepoMetadata;

use super::job::{ImportSummary, RepositoryJob};
use super::progress::ImportProgress;

pub const DEFAULT_CONCURRENCY: usize = 5;

/// Repository name and what its job returned.
type JobOutcome = (String, Result<ImportSummary>);

/// Outcome of a pool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Admits at most `concurrency` repository jobs at once. A slot is held for
/// the lifetime of its task and released however the task ends.
pub struct ImportPool {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    progress: ImportProgress,
}

impl ImportPool {
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            progress: ImportProgress::new(),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn progress(&self) -> &ImportProgress {
        &self.progress
    }

    /// Runs `job` for every repository. A failing or panicking job is logged
    /// and never stops its siblings.
    pub async fn run(&self, job: Arc<dyn RepositoryJob>, repos: Vec<RepoMetadata>) -> PoolReport {
        self.progress.start(repos.len());
        let mut tasks = JoinSet::new();

        for repo in repos {
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::error!("Import pool closed, {} not started", repo.id());
                    break;
                }
            };

            let job = Arc::clone(&job);
            tasks.spawn(async move {
                let _permit = permit;
                let name = repo.id().full_name();
                (name, job.run(repo).await)
            });

            // Reap whatever already finished so results are logged promptly.
            while let Some(joined) = tasks.try_join_next() {
                self.record(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            self.record(joined);
        }

        self.progress.finish();
        let snapshot = self.progress.snapshot();
        tracing::info!(
            "Imported {} repositories ({} failed): {} reference(s), {} dependency interval(s) in {:.1}s",
            snapshot.repos_done,
            snapshot.repos_failed,
            snapshot.references,
            snapshot.edges,
            snapshot.elapsed_ms as f64 / 1000.0
        );

        PoolReport {
            succeeded: snapshot.repos_done - snapshot.repos_failed,
            failed: snapshot.repos_failed,
        }
    }

    fn record(&self, joined: std::result::Result<JobOutcome, JoinError>) {
        match joined {
            Ok((_, Ok(summary))) => self.progress.inc(summary.references, summary.edges),
            Ok((name, Err(e))) => {
                tracing::error!("{}: import failed: {}", name, e);
                self.progress.inc_error();
            }
            Err(e) => {
                tracing::error!("Import task panicked: {}", e);
                self.progress.inc_error();
            }
        }
    }
}

impl Default for ImportPool {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}
