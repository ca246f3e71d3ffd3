use std::path::Path;

use ignore::WalkBuilder;

use crate::error::Result;
use crate::package::{BUILD_DIR, SOURCE_EXTENSION};

/// File stems that mark whole-program entry points.
const ENTRY_STEMS: [&str; 3] = ["main", "index", "app"];

/// Lists the source files of a checkout.
pub struct SourceWalker {
    extension: &'static str,
}

impl SourceWalker {
    pub fn new() -> Self {
        Self {
            extension: SOURCE_EXTENSION,
        }
    }

    /// Returns `/`-separated paths relative to `root`, sorted by file name
    /// within each directory. The compiler's build directory is skipped.
    pub fn walk(&self, root: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .ignore(true)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|entry| entry.file_name() != BUILD_DIR)
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() || !self.is_supported(path) {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(root) {
                let parts: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.push(parts.join("/"));
            }
        }

        Ok(files)
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e == self.extension)
    }
}

impl Default for SourceWalker {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `file` is conventionally a program entry (`Main`, `Index`, `App`).
pub fn is_entry_file(file: &str) -> bool {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .map_or(false, |stem| {
            ENTRY_STEMS.iter().any(|entry| stem.eq_ignore_ascii_case(entry))
        })
}
