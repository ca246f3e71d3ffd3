use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use xref_indexer::compiler::ElmMakeAdapter;
use xref_indexer::config::{XrefConfig, CONFIG_FILENAME};
use xref_indexer::error::{Result, XrefError};
use xref_indexer::history::{DependencyIntervalExtractor, GitRepository};
use xref_indexer::importer::{ImportPool, Importer, PoolReport, ReferencePass};
use xref_indexer::indexer::ModuleNameCache;
use xref_indexer::package::version::resolve_version;
use xref_indexer::package::{PackageId, SelectionPolicy, VersionCatalog, VersionRangeResolver};
use xref_indexer::store::{GraphStore, RepoEntry, SqliteGraphStore};

#[derive(Parser)]
#[command(name = "xref-indexer")]
#[command(about = "Cross-repository symbol reference and dependency history indexer")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Import every pending repository, seeding the queue from a list
    xref-indexer import --repos repos.json

    # Resolve the references of a local checkout
    xref-indexer refs ./my-app --repo me/my-app

    # Dependency intervals of a local clone
    xref-indexer history ./my-app --repo me/my-app

    # Resolve a version range against published versions
    xref-indexer resolve "1.0.0 <= v < 2.0.0" 0.9.0 1.0.0 1.5.0 2.0.0
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the YAML config file
    #[arg(long, default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    /// Path to the graph database (overrides paths.database)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import pending repositories with a bounded worker pool
    Import {
        /// JSON list of repositories (`"owner/name"` or metadata objects) to enqueue first
        #[arg(long)]
        repos: Option<PathBuf>,

        /// Number of repositories imported at once (overrides workers.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Resolve the references of a local checkout and print them as JSON
    Refs {
        /// Checkout to compile
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Repository id (owner/name)
        #[arg(long)]
        repo: String,

        /// Commit used in reference URLs (defaults to the checkout's HEAD)
        #[arg(long)]
        commit: Option<String>,
    },

    /// Extract dependency intervals from a local clone and print them as JSON
    History {
        /// Clean clone to walk; restored to its original checkout afterwards
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Repository id (owner/name)
        #[arg(long)]
        repo: String,
    },

    /// Resolve a version range against a list of published versions
    Resolve {
        /// Range expression, e.g. "1.0.0 <= v < 2.0.0"
        range: String,

        /// Published versions in catalog order
        versions: Vec<String>,

        /// Pick the first satisfying version instead of the highest
        #[arg(long)]
        first: bool,
    },

    /// Show stored dependency intervals of a repository
    Edges {
        /// Repository id (owner/name)
        repo: String,
    },

    /// Show stored references to a package
    Usages {
        /// Package id (owner/name)
        package: String,

        /// Only references through this installed version
        #[arg(long)]
        version: Option<String>,
    },
}

pub fn load_config(cli: &Cli) -> Result<XrefConfig> {
    let mut config = XrefConfig::load_or_default(&cli.config)?;
    if let Some(db) = &cli.db {
        config.paths.database = db.clone();
    }
    Ok(config)
}

pub async fn import(
    mut config: XrefConfig,
    repos: Option<&Path>,
    concurrency: Option<usize>,
) -> Result<PoolReport> {
    if let Some(concurrency) = concurrency {
        config.workers.concurrency = concurrency;
    }
    config.validate()?;
    let config = Arc::new(config);

    let store = Arc::new(SqliteGraphStore::new(
        &config.paths.database,
        config.workers.concurrency as u32 + 1,
    )?);

    let pending = {
        let mut session = store.session()?;
        if let Some(path) = repos {
            let entries: Vec<RepoEntry> = serde_json::from_str(&fs::read_to_string(path)?)?;
            let mut added = 0;
            for entry in entries {
                if session.enqueue_repository(&entry.into_metadata()?)? {
                    added += 1;
                }
            }
            println!("Enqueued {} new repositories from {}", added, path.display());
        }
        session.pending_repositories()?
    };
    println!("{} repositories pending", pending.len());

    let catalog = Arc::new(VersionCatalog::load(&config.catalog.source).await?);
    let importer = Importer::new(
        Arc::clone(&config),
        Arc::new(ElmMakeAdapter::from_config(&config.compiler)),
        VersionRangeResolver::new(catalog, config.catalog.selection),
        Arc::new(ModuleNameCache::new()),
        store,
    );

    let pool = ImportPool::new(config.workers.concurrency);
    let report = pool.run(Arc::new(importer), pending).await;
    println!(
        "Imported {} repositories, {} failed",
        report.succeeded, report.failed
    );
    Ok(report)
}

pub async fn refs(config: XrefConfig, path: &Path, repo: &str, commit: Option<String>) -> Result<()> {
    let repo = PackageId::parse(repo)?;
    let workdir = std::path::absolute(path)?;
    let commit = match commit {
        Some(commit) => commit,
        None => GitRepository::open(&workdir)
            .and_then(|git| git.head())
            .unwrap_or_else(|_| "HEAD".to_string()),
    };

    let config = Arc::new(config);
    let pass = ReferencePass::new(
        Arc::clone(&config),
        Arc::new(ElmMakeAdapter::from_config(&config.compiler)),
        Arc::new(ModuleNameCache::new()),
    );
    let references = pass.run(&repo, &workdir, &commit).await?;

    println!("{}", serde_json::to_string_pretty(&references)?);
    Ok(())
}

pub async fn history(config: XrefConfig, path: &Path, repo: &str) -> Result<()> {
    let owner = PackageId::parse(repo)?;
    let mut git = GitRepository::open(path)?;
    // Every commit is checked out with --force.
    if !git.is_clean()? {
        return Err(XrefError::Git(format!(
            "{} has uncommitted changes, commit or stash them first",
            path.display()
        )));
    }

    let catalog = Arc::new(VersionCatalog::load(&config.catalog.source).await?);
    let extractor = DependencyIntervalExtractor::new(
        VersionRangeResolver::new(catalog, config.catalog.selection),
        config.workers.max_commits,
    );

    let history = git.with_restored_checkout(|git| extractor.extract(&owner, git))?;

    if history.skipped {
        eprintln!(
            "History skipped: {} commits exceed the limit of {}",
            history.commit_count, config.workers.max_commits
        );
    }
    println!("{}", serde_json::to_string_pretty(&history.edges)?);
    Ok(())
}

pub fn resolve(range: &str, versions: &[String], first: bool) -> Result<()> {
    let policy = if first {
        SelectionPolicy::First
    } else {
        SelectionPolicy::Highest
    };
    println!("{}", resolve_version(range, versions, policy));
    Ok(())
}

pub fn edges(config: &XrefConfig, repo: &str) -> Result<()> {
    let repo = PackageId::parse(repo)?;
    let store = open_existing(&config.paths.database)?;
    let edges = store.session()?.dependency_edges(&repo.full_name())?;

    if edges.is_empty() {
        println!("No dependency intervals for {}", repo);
        return Ok(());
    }
    for edge in edges {
        let end = edge.end.map_or_else(|| "now".to_string(), |end| end.to_string());
        println!(
            "{} {} [{}, {})  ({})",
            edge.dependency_repo, edge.version, edge.start, end, edge.version_range
        );
    }
    Ok(())
}

pub fn usages(config: &XrefConfig, package: &str, version: Option<&str>) -> Result<()> {
    let package = PackageId::parse(package)?;
    let store = open_existing(&config.paths.database)?;
    let references = store
        .session()?
        .references_to(&package.full_name(), version)?;

    println!("{}", serde_json::to_string_pretty(&references)?);
    Ok(())
}

fn open_existing(db_path: &Path) -> Result<SqliteGraphStore> {
    if !db_path.exists() {
        return Err(XrefError::Config(format!(
            "database {} not found, run `xref-indexer import` first",
            db_path.display()
        )));
    }
    SqliteGraphStore::new(db_path, 1)
}
