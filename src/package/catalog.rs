//! Published-version catalog.
//!
//! Loaded once per run from the package site's `all-packages` listing (or a
//! local copy of it) and shared read-only by every import job.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, XrefError};

#[derive(Debug, Clone, Default)]
pub struct VersionCatalog {
    packages: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
    #[serde(default)]
    versions: Vec<String>,
}

impl VersionCatalog {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        Self {
            packages: entries.into_iter().collect(),
        }
    }

    /// Parses a `[{"name": ..., "versions": [...]}]` listing.
    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(content)
            .map_err(|e| XrefError::Catalog(format!("invalid package listing: {}", e)))?;
        Ok(Self::from_entries(
            entries.into_iter().map(|e| (e.name, e.versions)),
        ))
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub async fn fetch(url: &str) -> Result<Self> {
        let response = reqwest::get(url)
            .await
            .map_err(|e| XrefError::Catalog(format!("failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(XrefError::Catalog(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| XrefError::Catalog(format!("failed to read {}: {}", url, e)))?;
        Self::from_json(&body)
    }

    /// Loads from a URL or a file path.
    pub async fn load(source: &str) -> Result<Self> {
        let catalog = if source.starts_with("http://") || source.starts_with("https://") {
            Self::fetch(source).await?
        } else {
            Self::load_file(Path::new(source))?
        };
        tracing::info!("Loaded version catalog with {} packages", catalog.len());
        Ok(catalog)
    }

    /// Published versions of `package` in catalog order; empty if unknown.
    pub fn versions(&self, package: &str) -> &[String] {
        self.packages
            .get(package)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
