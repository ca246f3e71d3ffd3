//! Dependency Interval Extractor
//!
//! Replays a repository's history oldest first and records, for each
//! declared dependency, the periods during which one resolved version was in
//! effect. For a fixed (owner, dependency) pair the emitted intervals are
//! ordered, never overlap, and at most the last one is still open.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::package::{PackageId, VersionRangeResolver};
use crate::store::models::{DependencyEdge, RepoTimestamps};

use super::{Commit, HistorySource};

/// Everything extracted from one repository's history.
#[derive(Debug, Clone, Default)]
pub struct RepoHistory {
    /// Sorted by dependency, then start.
    pub edges: Vec<DependencyEdge>,
    pub timestamps: RepoTimestamps,
    pub commit_count: usize,
    /// The history exceeded the commit ceiling and wasn't walked.
    pub skipped: bool,
}

#[derive(Debug, Clone)]
struct OpenEdge {
    version: String,
    version_range: String,
    start: i64,
}

pub struct DependencyIntervalExtractor {
    resolver: VersionRangeResolver,
    max_commits: usize,
}

impl DependencyIntervalExtractor {
    pub fn new(resolver: VersionRangeResolver, max_commits: usize) -> Self {
        Self {
            resolver,
            max_commits,
        }
    }

    /// Walks every commit of `source`, leaving it checked out at the newest.
    pub fn extract(&self, owner: &PackageId, source: &mut dyn HistorySource) -> Result<RepoHistory> {
        let commits = source.commits()?;

        let mut history = RepoHistory {
            commit_count: commits.len(),
            timestamps: RepoTimestamps {
                created: commits.first().map(|c| c.timestamp),
                last_commit: commits.last().map(|c| c.timestamp),
            },
            ..Default::default()
        };

        if commits.len() > self.max_commits {
            tracing::info!(
                "{}: skipping history, {} commits exceed the limit of {}",
                owner,
                commits.len(),
                self.max_commits
            );
            history.skipped = true;
            return Ok(history);
        }

        let owner_repo = owner.full_name();
        let mut walk = IntervalWalk::new(&owner_repo);
        let mut previous = i64::MIN;

        for commit in &commits {
            let timestamp = commit.timestamp.max(previous);
            if timestamp != commit.timestamp {
                tracing::debug!(
                    "{}: commit {} goes back in time, clamping timestamp",
                    owner,
                    short_hash(commit)
                );
            }
            previous = timestamp;

            source.checkout(commit)?;
            let declared = match source.read_manifest()? {
                Some(manifest) => manifest.dependencies,
                None => {
                    tracing::debug!("{}: no manifest at {}", owner, short_hash(commit));
                    BTreeMap::new()
                }
            };

            walk.advance(timestamp, &declared, |dependency, range| {
                self.resolver.resolve(dependency, range)
            });
        }

        history.edges = walk.finish();
        Ok(history)
    }
}

/// Interval state carried across commits.
struct IntervalWalk<'a> {
    owner_repo: &'a str,
    open: BTreeMap<String, OpenEdge>,
    closed: Vec<DependencyEdge>,
}

impl<'a> IntervalWalk<'a> {
    fn new(owner_repo: &'a str) -> Self {
        Self {
            owner_repo,
            open: BTreeMap::new(),
            closed: Vec::new(),
        }
    }

    /// Applies the dependencies declared at one commit.
    fn advance<F>(&mut self, timestamp: i64, declared: &BTreeMap<String, String>, resolve: F)
    where
        F: Fn(&str, &str) -> String,
    {
        for (dependency, range) in declared {
            let version = resolve(dependency, range);

            if let Some(current) = self.open.get(dependency) {
                if current.version == version {
                    continue;
                }
                if let Some(previous) = self.open.remove(dependency) {
                    self.close(dependency.clone(), previous, timestamp);
                }
            }

            self.open.insert(
                dependency.clone(),
                OpenEdge {
                    version,
                    version_range: range.clone(),
                    start: timestamp,
                },
            );
        }

        let dropped: BTreeSet<String> = self
            .open
            .keys()
            .filter(|dependency| !declared.contains_key(*dependency))
            .cloned()
            .collect();
        for dependency in dropped {
            if let Some(previous) = self.open.remove(&dependency) {
                self.close(dependency, previous, timestamp);
            }
        }
    }

    /// Closes an interval at `end`. Empty intervals are discarded.
    fn close(&mut self, dependency: String, edge: OpenEdge, end: i64) {
        if end <= edge.start {
            return;
        }
        self.closed.push(self.edge(dependency, edge, Some(end)));
    }

    fn edge(&self, dependency: String, edge: OpenEdge, end: Option<i64>) -> DependencyEdge {
        DependencyEdge {
            owner_repo: self.owner_repo.to_string(),
            dependency_repo: dependency,
            version: edge.version,
            version_range: edge.version_range,
            start: edge.start,
            end,
        }
    }

    fn finish(mut self) -> Vec<DependencyEdge> {
        let open = std::mem::take(&mut self.open);
        let mut edges = std::mem::take(&mut self.closed);
        edges.extend(
            open.into_iter()
                .map(|(dependency, edge)| self.edge(dependency, edge, None)),
        );
        edges.sort_by(|a, b| {
            a.dependency_repo
                .cmp(&b.dependency_repo)
                .then(a.start.cmp(&b.start))
        });
        edges
    }
}

fn short_hash(commit: &Commit) -> &str {
    &commit.hash[..commit.hash.len().min(7)]
}
