//! Reference Crawler
//!
//! Drives a [`DiagnosticSource`] over every source file of a package with a
//! work-list: entry files first, then the rest in discovery order. Each
//! compile resolves the file itself plus every file its diagnostics
//! concerned, so a whole-program compile of `Main.elm` usually clears most
//! of the queue at once.

use std::collections::{BTreeSet, VecDeque};
use std::path::Path;

use crate::compiler::{DiagnosticSource, ExternalReference};
use crate::error::Result;

use super::walker::is_entry_file;

/// Pending files plus the set already resolved.
#[derive(Debug, Clone, Default)]
pub struct CompileQueue {
    pending: VecDeque<String>,
    resolved: BTreeSet<String>,
}

impl CompileQueue {
    /// Builds the queue with entry files ahead of the others. Order within
    /// each group is preserved.
    pub fn new(files: impl IntoIterator<Item = String>) -> Self {
        let (entries, regular): (Vec<_>, Vec<_>) =
            files.into_iter().partition(|file| is_entry_file(file));

        let mut seen = BTreeSet::new();
        let pending = entries
            .into_iter()
            .chain(regular)
            .filter(|file| seen.insert(file.clone()))
            .collect();

        Self {
            pending,
            resolved: BTreeSet::new(),
        }
    }

    /// Next file to compile.
    pub fn pop(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    /// Marks `files` resolved and drops them from the pending list.
    pub fn resolve<I, S>(&mut self, files: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolved.extend(files.into_iter().map(Into::into));
        let resolved = &self.resolved;
        self.pending.retain(|file| !resolved.contains(file));
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    pub fn is_resolved(&self, file: &str) -> bool {
        self.resolved.contains(file)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Outcome of crawling one package.
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub references: Vec<ExternalReference>,
    /// Files handed to the compiler, in order.
    pub compiled: Vec<String>,
    /// Files whose compilation failed.
    pub failed: Vec<String>,
}

pub struct ReferenceCrawler<'a> {
    source: &'a dyn DiagnosticSource,
}

impl<'a> ReferenceCrawler<'a> {
    pub fn new(source: &'a dyn DiagnosticSource) -> Self {
        Self { source }
    }

    /// Compiles every file of the package at `workdir` at least once and
    /// collects the external references found. A failing file is logged and
    /// skipped.
    pub async fn crawl(&self, workdir: &Path, files: Vec<String>) -> Result<CrawlResult> {
        self.source.clear_cache(workdir).await?;

        let mut queue = CompileQueue::new(files);
        let mut result = CrawlResult::default();

        while let Some(file) = queue.pop() {
            result.compiled.push(file.clone());

            match self.source.compile(workdir, &file).await {
                Ok(report) => {
                    tracing::info!(
                        "compile {}: success ({} references)",
                        file,
                        report.references.len()
                    );
                    result.references.extend(report.references);
                    queue.resolve(report.compiled_files);
                }
                Err(e) => {
                    tracing::warn!("compile {}: failed: {}", file, e);
                    result.failed.push(file.clone());
                }
            }

            queue.resolve([file]);
        }

        Ok(result)
    }
}
