//! Integration tests for dependency interval extraction over real git
//! histories built in temporary directories.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use xref_indexer::history::{DependencyIntervalExtractor, GitRepository, HistorySource};
use xref_indexer::package::{PackageId, SelectionPolicy, VersionCatalog, VersionRangeResolver};
use xref_indexer::store::DependencyEdge;

// ============================================================================
// Test Helpers
// ============================================================================

/// Base of all commit dates, in seconds.
const T0: i64 = 1_500_000_000;

/// Stored timestamp of a commit made `seconds` after [`T0`].
fn ms(seconds: i64) -> i64 {
    (T0 + seconds) * 1000
}

fn git(dir: &Path, args: &[&str], seconds: i64) {
    let date = format!("@{} +0000", T0 + seconds);
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

/// Builds a repository with one commit per manifest state. `None` removes the
/// manifest. Times are seconds after [`T0`].
fn create_history(states: &[(i64, Option<&str>)]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let root = dir.path();
    git(root, &["init", "--quiet"], 0);
    fs::write(root.join("README.md"), "# app").unwrap();

    for (seconds, manifest) in states {
        let path = root.join("elm-package.json");
        match manifest {
            Some(content) => fs::write(&path, content).unwrap(),
            None => {
                let _ = fs::remove_file(&path);
            }
        }
        fs::write(root.join("README.md"), format!("# app {}", seconds)).unwrap();
        git(root, &["add", "-A"], *seconds);
        git(root, &["commit", "--quiet", "-m", "change"], *seconds);
    }

    dir
}

fn manifest(deps: &[(&str, &str)]) -> String {
    let deps: serde_json::Map<String, serde_json::Value> = deps
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    serde_json::json!({
        "version": "1.0.0",
        "source-directories": ["src"],
        "dependencies": deps
    })
    .to_string()
}

fn extractor(max_commits: usize) -> DependencyIntervalExtractor {
    let catalog = VersionCatalog::from_entries([
        (
            "elm-lang/core".to_string(),
            vec!["4.0.5".to_string(), "5.0.0".to_string(), "5.1.1".to_string()],
        ),
        (
            "elm-lang/html".to_string(),
            vec!["1.1.0".to_string(), "2.0.0".to_string()],
        ),
    ]);
    DependencyIntervalExtractor::new(
        VersionRangeResolver::new(Arc::new(catalog), SelectionPolicy::Highest),
        max_commits,
    )
}

fn for_dependency<'a>(edges: &'a [DependencyEdge], dependency: &str) -> Vec<&'a DependencyEdge> {
    edges
        .iter()
        .filter(|e| e.dependency_repo == dependency)
        .collect()
}

const CORE_4: (&str, &str) = ("elm-lang/core", "4.0.0 <= v < 5.0.0");
const CORE_5: (&str, &str) = ("elm-lang/core", "5.0.0 <= v < 6.0.0");
const HTML_2: (&str, &str) = ("elm-lang/html", "2.0.0 <= v < 3.0.0");

// ============================================================================
// Interval Extraction
// ============================================================================

#[test]
fn test_upgrade_and_removal_produce_ordered_intervals() {
    let v4 = manifest(&[CORE_4, HTML_2]);
    let v5 = manifest(&[CORE_5, HTML_2]);
    let v5_only = manifest(&[CORE_5]);
    let dir = create_history(&[
        (1_000, Some(v4.as_str())),
        (2_000, Some(v4.as_str())),
        (3_000, Some(v5.as_str())),
        (4_000, Some(v5_only.as_str())),
    ]);

    let mut repo = GitRepository::open(dir.path()).unwrap();
    let history = extractor(100)
        .extract(&PackageId::new("me", "app"), &mut repo)
        .unwrap();

    let core = for_dependency(&history.edges, "elm-lang/core");
    assert_eq!(core.len(), 2);
    assert_eq!(core[0].version, "4.0.5");
    assert_eq!((core[0].start, core[0].end), (ms(1_000), Some(ms(3_000))));
    assert_eq!(core[1].version, "5.1.1");
    assert_eq!((core[1].start, core[1].end), (ms(3_000), None));

    let html = for_dependency(&history.edges, "elm-lang/html");
    assert_eq!(html.len(), 1);
    assert_eq!((html[0].start, html[0].end), (ms(1_000), Some(ms(4_000))));

    assert_eq!(history.timestamps.created, Some(ms(1_000)));
    assert_eq!(history.timestamps.last_commit, Some(ms(4_000)));
}

#[test]
fn test_missing_or_invalid_manifest_closes_open_edges() {
    let v5 = manifest(&[CORE_5]);
    let dir = create_history(&[
        (1_000, Some(v5.as_str())),
        (2_000, Some("{ not json")),
        (3_000, Some(v5.as_str())),
        (4_000, None),
    ]);

    let mut repo = GitRepository::open(dir.path()).unwrap();
    let history = extractor(100)
        .extract(&PackageId::new("me", "app"), &mut repo)
        .unwrap();

    let core = for_dependency(&history.edges, "elm-lang/core");
    assert_eq!(core.len(), 2);
    assert_eq!((core[0].start, core[0].end), (ms(1_000), Some(ms(2_000))));
    assert_eq!((core[1].start, core[1].end), (ms(3_000), Some(ms(4_000))));
}

#[test]
fn test_intervals_never_overlap() {
    let states: Vec<String> = [
        vec![CORE_4],
        vec![CORE_5, HTML_2],
        vec![CORE_4, HTML_2],
        vec![HTML_2],
        vec![CORE_5],
        vec![CORE_5, HTML_2],
    ]
    .iter()
    .map(|deps| manifest(deps))
    .collect();
    let commits: Vec<(i64, Option<&str>)> = states
        .iter()
        .enumerate()
        .map(|(i, m)| (1_000 + i as i64 * 100, Some(m.as_str())))
        .collect();
    let dir = create_history(&commits);

    let mut repo = GitRepository::open(dir.path()).unwrap();
    let history = extractor(100)
        .extract(&PackageId::new("me", "app"), &mut repo)
        .unwrap();

    for dependency in ["elm-lang/core", "elm-lang/html"] {
        let edges = for_dependency(&history.edges, dependency);
        assert!(edges.iter().filter(|e| e.is_open()).count() <= 1);
        for pair in edges.windows(2) {
            let end = pair[0].end.expect("only the newest interval may be open");
            assert!(pair[0].start < end);
            assert!(end <= pair[1].start);
        }
    }
}

#[test]
fn test_commit_ceiling_skips_history() {
    let v5 = manifest(&[CORE_5]);
    let dir = create_history(&[(1_000, Some(v5.as_str())), (2_000, Some(v5.as_str())), (3_000, None)]);

    let mut repo = GitRepository::open(dir.path()).unwrap();
    let head = repo.head().unwrap();
    let history = extractor(2)
        .extract(&PackageId::new("me", "app"), &mut repo)
        .unwrap();

    assert!(history.skipped);
    assert!(history.edges.is_empty());
    // Nothing was checked out.
    assert_eq!(repo.head().unwrap(), head);
    assert!(repo.read_manifest().unwrap().is_none());
}
