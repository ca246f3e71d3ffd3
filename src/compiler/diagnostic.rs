//! Parsing of the compiler's diagnostic stream.
//!
//! The compiler prints one JSON document per line, interleaved with build
//! progress text. Each document is a diagnostic or an array of them.
//! Diagnostics tagged `external value` describe a use of a value defined in
//! another module, with the defining package and module embedded in the
//! free-text overview:
//!
//! ```text
//! External value `map` exists!!Canonical {_package = Name {_user = "elm-lang", _project = "core"}, _module = "List"}
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::package::PackageId;

use super::{CompileReport, ExternalReference, Region};

/// Tag of diagnostics that carry a cross-module value reference.
pub const EXTERNAL_VALUE_TAG: &str = "external value";

static OVERVIEW_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"External value [(`](.*)[`)] exists!!Canonical \{_package = Name \{_user = "(.*)", _project = "(.*)"\}, _module = "(.*)"\}"#,
    )
    .expect("valid overview regex")
});

/// One raw diagnostic record.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileDiagnostic {
    pub tag: String,
    #[serde(default)]
    pub overview: String,
    pub region: Region,
    pub file: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DiagnosticLine {
    Many(Vec<CompileDiagnostic>),
    One(CompileDiagnostic),
}

/// Symbol, owner, project and module scraped from an overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewMatch {
    pub symbol: String,
    pub package: PackageId,
    pub module: String,
}

/// Extracts the referenced value from an `external value` overview.
pub fn parse_overview(overview: &str) -> Option<OverviewMatch> {
    let flattened = overview.replace('\n', " ");
    let caps = OVERVIEW_REGEX.captures(&flattened)?;
    Some(OverviewMatch {
        symbol: caps[1].to_string(),
        package: PackageId::new(&caps[2], &caps[3]),
        module: caps[4].to_string(),
    })
}

/// Parses every line of compiler output that is a diagnostic document.
/// Lines that aren't are skipped.
pub fn parse_diagnostics(output: &str) -> Vec<CompileDiagnostic> {
    output
        .lines()
        .filter_map(|line| serde_json::from_str::<DiagnosticLine>(line.trim()).ok())
        .flat_map(|parsed| match parsed {
            DiagnosticLine::Many(diagnostics) => diagnostics,
            DiagnosticLine::One(diagnostic) => vec![diagnostic],
        })
        .collect()
}

/// Turns the compiler output for one file into external references.
///
/// Every file a diagnostic concerns is reported as compiled. References into
/// the package under compilation are dropped.
pub fn scrape_references(output: &str, workdir: &Path) -> CompileReport {
    let mut compiled_files = BTreeSet::new();
    let mut references = Vec::new();

    for diagnostic in parse_diagnostics(output) {
        let file = normalize_file(&diagnostic.file, workdir);
        compiled_files.insert(file.clone());

        if diagnostic.tag != EXTERNAL_VALUE_TAG {
            continue;
        }

        let Some(found) = parse_overview(&diagnostic.overview) else {
            tracing::warn!("couldn't parse message: \"{}\"", diagnostic.overview);
            continue;
        };

        if found.package.is_local_placeholder() {
            continue;
        }

        references.push(ExternalReference {
            symbol: found.symbol,
            package: found.package,
            module: found.module,
            region: diagnostic.region,
            file,
        });
    }

    CompileReport {
        references,
        compiled_files,
    }
}

/// Converts a compiler-reported path to a `/`-separated path relative to
/// `workdir`.
pub fn normalize_file(raw: &str, workdir: &Path) -> String {
    let path = Path::new(raw);
    let relative = path.strip_prefix(workdir).unwrap_or(path);

    relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
