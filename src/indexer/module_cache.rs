//! Path to module-name lookup, shared across import jobs.
//!
//! Entries are keyed by absolute path and remember the checkout fingerprint
//! (commit hash, or version of a materialised package) they were read at. A
//! lookup with a different fingerprint re-reads the file, and a working
//! directory that is about to be reused is dropped wholesale with
//! [`ModuleNameCache::invalidate_under`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;

static MODULE_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:port\s+|effect\s+)?module\s+([A-Za-z][\w.]*)")
        .expect("valid module regex")
});

/// Module name declared in a source file header.
pub fn parse_module_name(source: &str) -> Option<String> {
    MODULE_DECLARATION
        .captures(source)
        .map(|caps| caps[1].to_string())
}

#[derive(Debug, Clone)]
struct CachedModule {
    fingerprint: String,
    module: Option<String>,
}

#[derive(Debug, Default)]
pub struct ModuleNameCache {
    entries: RwLock<HashMap<PathBuf, CachedModule>>,
}

impl ModuleNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Module declared by the file at `path` as of `fingerprint`.
    pub fn module_of(&self, path: &Path, fingerprint: &str) -> Result<Option<String>> {
        let key = std::path::absolute(path)?;

        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = entries.get(&key) {
                if cached.fingerprint == fingerprint {
                    return Ok(cached.module.clone());
                }
            }
        }

        let source = std::fs::read_to_string(&key)?;
        let module = parse_module_name(&source);
        if module.is_none() {
            tracing::warn!("Couldn't get module of file: {}", key.display());
        }

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key,
                CachedModule {
                    fingerprint: fingerprint.to_string(),
                    module: module.clone(),
                },
            );

        Ok(module)
    }

    /// Drops every entry under `root`.
    pub fn invalidate_under(&self, root: &Path) {
        let Ok(root) = std::path::absolute(root) else {
            return;
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|path, _| !path.starts_with(&root));
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_module_name_variants() {
        assert_eq!(
            parse_module_name("module Page.Home exposing (view)\n\nimport Html"),
            Some("Page.Home".to_string())
        );
        assert_eq!(
            parse_module_name("port module Ports exposing (..)"),
            Some("Ports".to_string())
        );
        assert_eq!(
            parse_module_name("effect module Task where { command = MyCmd } exposing (..)"),
            Some("Task".to_string())
        );
        assert_eq!(
            parse_module_name("-- comment\nmodule Main exposing (main)"),
            Some("Main".to_string())
        );
        assert_eq!(parse_module_name("main = text \"hi\""), None);
    }

    #[test]
    fn test_cache_hits_until_fingerprint_changes() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Main.elm");
        fs::write(&file, "module Main exposing (..)").unwrap();

        let cache = ModuleNameCache::new();
        assert_eq!(cache.module_of(&file, "c1").unwrap().as_deref(), Some("Main"));

        fs::write(&file, "module Renamed exposing (..)").unwrap();
        // Same fingerprint: served from cache.
        assert_eq!(cache.module_of(&file, "c1").unwrap().as_deref(), Some("Main"));
        // New checkout: re-read.
        assert_eq!(cache.module_of(&file, "c2").unwrap().as_deref(), Some("Renamed"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_under_root() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::write(a.path().join("A.elm"), "module A exposing (..)").unwrap();
        fs::write(b.path().join("B.elm"), "module B exposing (..)").unwrap();

        let cache = ModuleNameCache::new();
        cache.module_of(&a.path().join("A.elm"), "x").unwrap();
        cache.module_of(&b.path().join("B.elm"), "x").unwrap();
        assert_eq!(cache.len(), 2);

        cache.invalidate_under(a.path());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let cache = ModuleNameCache::new();
        assert!(cache.module_of(&dir.path().join("Nope.elm"), "x").is_err());
    }
}
