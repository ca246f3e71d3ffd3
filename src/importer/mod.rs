pub mod job;
pub mod pool;
pub mod progress;

pub use job::{dump_references, ImportSummary, Importer, ReferencePass, RepositoryJob};
pub use pool::{ImportPool, PoolReport, DEFAULT_CONCURRENCY};
pub use progress::{ImportProgress, ProgressSnapshot};
