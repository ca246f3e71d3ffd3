//! End-to-end import of repositories served from a local directory, with a
//! scripted compiler and an in-memory graph store.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use xref_indexer::compiler::{CompileReport, DiagnosticSource, ExternalReference, Position, Region};
use xref_indexer::config::XrefConfig;
use xref_indexer::error::{Result, XrefError};
use xref_indexer::importer::{ImportPool, Importer, RepositoryJob};
use xref_indexer::indexer::ModuleNameCache;
use xref_indexer::package::{PackageId, SelectionPolicy, VersionCatalog, VersionRangeResolver};
use xref_indexer::history::{GitRepository, HistorySource};
use xref_indexer::store::{GraphSession, GraphStore, Reference, RepoMetadata, SqliteGraphStore};

// ============================================================================
// Test Helpers
// ============================================================================

/// Reports `List.map` used on line 3 of every entry file.
struct EntryFileCompiler;

#[async_trait]
impl DiagnosticSource for EntryFileCompiler {
    async fn compile(&self, _workdir: &Path, file: &str) -> Result<CompileReport> {
        let references = if file.ends_with("Main.elm") {
            vec![ExternalReference {
                symbol: "map".into(),
                package: PackageId::new("elm-lang", "core"),
                module: "List".into(),
                region: Region {
                    start: Position { line: 3, column: 5 },
                    end: Position { line: 3, column: 13 },
                },
                file: file.to_string(),
            }]
        } else {
            Vec::new()
        };
        Ok(CompileReport {
            references,
            compiled_files: BTreeSet::from([file.to_string()]),
        })
    }

    async fn clear_cache(&self, _workdir: &Path) -> Result<()> {
        Ok(())
    }
}

fn git(dir: &Path, args: &[&str], seconds: i64) {
    let date = format!("@{} +0000", seconds);
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_AUTHOR_DATE", &date)
        .env("GIT_COMMITTER_DATE", &date)
        .status()
        .expect("Failed to run git");
    assert!(status.success(), "git {:?} failed", args);
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Publishes `<host>/me/app` with two commits: core 4.x, then core 5.x.
/// The installed-dependency tree is committed so no install step is needed.
fn publish_app(host: &Path) {
    let root = host.join("me").join("app");
    fs::create_dir_all(&root).unwrap();
    git(&root, &["init", "--quiet"], 1_500_000_000);

    write(
        &root,
        "elm-package.json",
        r#"{ "source-directories": ["src"], "elm-version": "0.18.0 <= v < 0.19.0",
             "dependencies": { "elm-lang/core": "4.0.0 <= v < 5.0.0" } }"#,
    );
    write(&root, "src/Main.elm", "module Main exposing (main)");
    git(&root, &["add", "-A"], 1_500_000_000);
    git(&root, &["commit", "--quiet", "-m", "init"], 1_500_000_000);

    write(
        &root,
        "elm-package.json",
        r#"{ "source-directories": ["src"], "elm-version": "0.18.0 <= v < 0.19.0",
             "dependencies": { "elm-lang/core": "5.0.0 <= v < 6.0.0" } }"#,
    );
    write(&root, "src/Util.elm", "module Util exposing (..)");
    write(&root, "elm-stuff/exact-dependencies.json", r#"{ "elm-lang/core": "5.1.1" }"#);
    write(
        &root,
        "elm-stuff/packages/elm-lang/core/5.1.1/elm-package.json",
        r#"{ "source-directories": ["src"] }"#,
    );
    write(
        &root,
        "elm-stuff/packages/elm-lang/core/5.1.1/src/List.elm",
        "module List exposing (..)",
    );
    git(&root, &["add", "-A"], 1_500_003_600);
    git(&root, &["commit", "--quiet", "-m", "upgrade core"], 1_500_003_600);
}

struct Fixture {
    host: TempDir,
    work: TempDir,
    dumps: TempDir,
    store: Arc<SqliteGraphStore>,
    importer: Arc<Importer>,
}

fn importer(host: &Path, work: &Path, dumps: &Path, store: Arc<dyn GraphStore>) -> Importer {
    let mut config = XrefConfig::default();
    config.github.host = host.to_string_lossy().into_owned();
    config.paths.repos_dir = work.to_path_buf();
    config.paths.references_dir = Some(dumps.to_path_buf());
    config.compiler.install_command = Vec::new();

    let catalog = VersionCatalog::from_entries([(
        "elm-lang/core".to_string(),
        vec!["4.0.5".to_string(), "5.1.1".to_string()],
    )]);
    Importer::new(
        Arc::new(config),
        Arc::new(EntryFileCompiler),
        VersionRangeResolver::new(Arc::new(catalog), SelectionPolicy::Highest),
        Arc::new(ModuleNameCache::new()),
        store,
    )
}

fn fixture() -> Fixture {
    let host = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let dumps = TempDir::new().unwrap();
    publish_app(host.path());

    let store = Arc::new(SqliteGraphStore::in_memory().unwrap());
    let importer = Arc::new(importer(
        host.path(),
        work.path(),
        dumps.path(),
        store.clone(),
    ));

    Fixture {
        host,
        work,
        dumps,
        store,
        importer,
    }
}

/// Store whose sessions can't be opened.
struct UnavailableStore;

impl GraphStore for UnavailableStore {
    fn session(&self) -> Result<Box<dyn GraphSession + '_>> {
        Err(XrefError::Config("database unavailable".into()))
    }
}

fn app() -> RepoMetadata {
    RepoMetadata {
        owner: "me".into(),
        name: "app".into(),
        stars: Some(42),
        last_updated: None,
        license: Some("MIT".into()),
    }
}

// ============================================================================
// Import
// ============================================================================

#[tokio::test]
async fn test_import_persists_references_and_intervals() {
    let f = fixture();
    f.store.session().unwrap().enqueue_repository(&app()).unwrap();

    let summary = f.importer.run(app()).await.unwrap();
    assert_eq!(summary.references, 1);
    assert_eq!(summary.edges, 2);

    let mut session = f.store.session().unwrap();
    let refs = session.references_from("me/app").unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].referred.file, "src/List.elm");
    assert_eq!(refs[0].version.as_deref(), Some("5.1.1"));

    let edges = session.dependency_edges("me/app").unwrap();
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].version, "4.0.5");
    assert_eq!(edges[0].start, 1_500_000_000_000);
    assert_eq!(edges[0].end, Some(1_500_003_600_000));
    assert_eq!(edges[1].version, "5.1.1");
    assert!(edges[1].is_open());

    assert!(session.pending_repositories().unwrap().is_empty());
    assert_eq!(session.references_to("elm-lang/core", Some("5.1.1")).unwrap().len(), 1);
}

#[tokio::test]
async fn test_import_writes_dump_and_empties_workdir() {
    let f = fixture();

    f.importer.run(app()).await.unwrap();

    let dump = f.dumps.path().join("me_app.json");
    let refs: Vec<Reference> = serde_json::from_str(&fs::read_to_string(dump).unwrap()).unwrap();
    assert_eq!(refs.len(), 1);
    assert!(refs[0].url.contains("/me/app/blob/"));

    assert!(!f.work.path().join("me").join("app").exists());
}

#[tokio::test]
async fn test_reimport_replaces_previous_results() {
    let f = fixture();

    f.importer.run(app()).await.unwrap();
    f.importer.run(app()).await.unwrap();

    let mut session = f.store.session().unwrap();
    assert_eq!(session.references_from("me/app").unwrap().len(), 1);
    assert_eq!(session.dependency_edges("me/app").unwrap().len(), 2);
}

#[tokio::test]
async fn test_import_refreshes_slot_left_detached() {
    let f = fixture();
    let slot = f.work.path().join("me").join("app");
    let url = f.host.path().join("me").join("app");
    let mut stale = GitRepository::clone_or_pull(&url.to_string_lossy(), &slot).unwrap();
    let commits = stale.commits().unwrap();
    stale.checkout(&commits[0]).unwrap();

    let summary = f.importer.run(app()).await.unwrap();

    // The installed packages only exist at the newest commit.
    assert_eq!(summary.references, 1);
    assert_eq!(summary.edges, 2);
    assert!(!slot.exists());
}

#[tokio::test]
async fn test_failed_store_write_still_empties_slot() {
    let f = fixture();
    let importer = importer(
        f.host.path(),
        f.work.path(),
        f.dumps.path(),
        Arc::new(UnavailableStore),
    );

    let result = importer.run(app()).await;

    assert!(matches!(result, Err(XrefError::Config(_))));
    assert!(!f.work.path().join("me").join("app").exists());
}

#[tokio::test]
async fn test_failed_clone_is_marked_imported() {
    let f = fixture();
    let missing = RepoMetadata::from_id(&PackageId::new("me", "missing"));
    f.store.session().unwrap().enqueue_repository(&missing).unwrap();

    assert!(f.importer.run(missing).await.is_err());
    assert!(f.store.session().unwrap().pending_repositories().unwrap().is_empty());
}

#[tokio::test]
async fn test_pool_imports_pending_repositories() {
    let f = fixture();
    {
        let mut session = f.store.session().unwrap();
        session.enqueue_repository(&app()).unwrap();
        session
            .enqueue_repository(&RepoMetadata::from_id(&PackageId::new("me", "missing")))
            .unwrap();
    }
    let pending = f.store.session().unwrap().pending_repositories().unwrap();
    assert_eq!(pending.len(), 2);

    let pool = ImportPool::new(2);
    let report = pool.run(f.importer.clone(), pending).await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(pool.progress().snapshot().references, 1);
    assert!(f.host.path().join("me/app/.git").is_dir());
}
