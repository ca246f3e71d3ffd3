pub mod compiler;
pub mod config;
pub mod error;
pub mod history;
pub mod importer;
pub mod indexer;
pub mod package;
pub mod store;

pub use compiler::{CompileReport, DiagnosticSource, ElmMakeAdapter, ExternalReference, Position, Region};
pub use config::XrefConfig;
pub use error::{Result, XrefError};
pub use history::{Commit, DependencyIntervalExtractor, GitRepository, HistorySource, RepoHistory};
pub use importer::{ImportPool, Importer, ReferencePass, RepositoryJob};
pub use indexer::{
    CompileQueue, ModuleNameCache, ModuleResolver, ReferenceAssembler, ReferenceCrawler, SourceWalker,
};
pub use package::{
    Manifest, Package, PackageId, SelectionPolicy, VersionCatalog, VersionRange,
    VersionRangeResolver,
};
pub use store::{
    DependencyEdge, FileRef, GraphSession, GraphStore, Reference, RepoMetadata, SqliteGraphStore,
};
