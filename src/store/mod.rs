//! Graph store client.
//!
//! Import jobs never share a connection: each one opens a [`GraphSession`]
//! for its writes and the session hands its connection back when dropped.

pub mod models;
pub mod sqlite;

use crate::error::Result;

pub use models::{DependencyEdge, FileRef, Reference, RepoEntry, RepoMetadata, RepoTimestamps};
pub use sqlite::SqliteGraphStore;

/// Persistent graph of repositories, reference edges and dependency edges.
pub trait GraphStore: Send + Sync {
    /// Acquires a session. Blocks until a connection is available.
    fn session(&self) -> Result<Box<dyn GraphSession + '_>>;
}

/// A scoped handle on the store.
pub trait GraphSession {
    /// Registers a repository to import. Returns `false` if it was known.
    fn enqueue_repository(&mut self, meta: &RepoMetadata) -> Result<bool>;

    /// Repositories not yet marked imported, most starred first.
    fn pending_repositories(&mut self) -> Result<Vec<RepoMetadata>>;

    /// Inserts or refreshes a repository's metadata and commit timestamps.
    fn upsert_repository(&mut self, meta: &RepoMetadata, timestamps: &RepoTimestamps) -> Result<()>;

    /// Replaces every reference originating in `repo`.
    fn replace_references(&mut self, repo: &str, references: &[Reference]) -> Result<usize>;

    /// Replaces every dependency edge owned by `owner_repo`.
    fn replace_dependency_edges(&mut self, owner_repo: &str, edges: &[DependencyEdge]) -> Result<usize>;

    fn mark_imported(&mut self, repo: &str) -> Result<()>;

    fn references_from(&mut self, repo: &str) -> Result<Vec<Reference>>;

    /// Edges owned by `owner_repo`, ordered by dependency then start.
    fn dependency_edges(&mut self, owner_repo: &str) -> Result<Vec<DependencyEdge>>;

    /// References from any repository to symbols of `repo`, filtered to a
    /// version when given.
    fn references_to(&mut self, repo: &str, version: Option<&str>) -> Result<Vec<Reference>>;
}
