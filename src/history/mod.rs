//! Commit history and dependency intervals.
//!
//! [`HistorySource`] abstracts the checkout being walked so the extractor can
//! be driven by a real clone ([`GitRepository`]) or by a scripted history.

pub mod git;
pub mod intervals;

use crate::error::Result;
use crate::package::Manifest;

pub use git::GitRepository;
pub use intervals::{DependencyIntervalExtractor, RepoHistory};

/// One commit of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub hash: String,
    /// Committer timestamp, milliseconds since the epoch.
    pub timestamp: i64,
}

/// A working tree that can be moved across commits.
///
/// Checkouts mutate the tree in place, so a source must only be driven by one
/// walker at a time.
pub trait HistorySource {
    /// All commits, oldest first.
    fn commits(&mut self) -> Result<Vec<Commit>>;

    fn checkout(&mut self, commit: &Commit) -> Result<()>;

    /// Manifest of the current checkout. Absent or unparsable manifests are
    /// `Ok(None)`.
    fn read_manifest(&self) -> Result<Option<Manifest>>;
}
