//! Compiler Diagnostic Adapter.
//!
//! Invokes the external compiler on one file and turns its diagnostic stream
//! into [`ExternalReference`] records. The scraping of free-text overviews
//! stays behind [`DiagnosticSource`], so the crawler never sees it.

pub mod diagnostic;
pub mod elm_make;
pub mod process;

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::package::PackageId;

pub use diagnostic::{parse_diagnostics, parse_overview, scrape_references, CompileDiagnostic};
pub use elm_make::ElmMakeAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Source span, 1-based as reported by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region {
    pub start: Position,
    pub end: Position,
}

impl Region {
    /// GitHub-style line anchor: `L12` or `L12-L14`.
    pub fn line_anchor(&self) -> String {
        if self.start.line == self.end.line {
            format!("L{}", self.start.line)
        } else {
            format!("L{}-L{}", self.start.line, self.end.line)
        }
    }
}

/// A use, in `file`, of `symbol` defined in `module` of `package`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    pub symbol: String,
    pub package: PackageId,
    pub module: String,
    pub region: Region,
    /// Referring file, relative to the repository root.
    pub file: String,
}

/// Result of compiling one file.
#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    pub references: Vec<ExternalReference>,
    /// Every file (relative to the repository root) the diagnostics concerned.
    pub compiled_files: BTreeSet<String>,
}

/// Source of structured diagnostics for one file.
#[async_trait]
pub trait DiagnosticSource: Send + Sync {
    /// Compiles `file` (relative to `workdir`) and returns what it referenced.
    async fn compile(&self, workdir: &Path, file: &str) -> Result<CompileReport>;

    /// Prepares `workdir` for a fresh crawl.
    async fn clear_cache(&self, workdir: &Path) -> Result<()>;
}
