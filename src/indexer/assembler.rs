//! Reference Graph Assembler
//!
//! Turns crawler candidates into finished [`Reference`] records: the referred
//! module is resolved to its defining file, the installed dependency version
//! is stamped on, and the referring region is mapped to a browsable URL.
//! Candidates whose module can't be resolved are dropped.

use xxhash_rust::xxh3::xxh3_64;

use crate::compiler::ExternalReference;
use crate::error::{Result, XrefError};
use crate::package::PackageId;
use crate::store::models::{FileRef, Reference};

use super::module_cache::ModuleNameCache;
use super::module_resolver::ModuleResolver;

pub struct ReferenceAssembler<'a> {
    repo: PackageId,
    commit: String,
    host: String,
    resolver: &'a ModuleResolver,
    modules: &'a ModuleNameCache,
}

impl<'a> ReferenceAssembler<'a> {
    /// `commit` is the checked-out revision of `repo`; it becomes part of the
    /// URL and fingerprints the referring files in `modules`.
    pub fn new(
        repo: PackageId,
        commit: impl Into<String>,
        host: impl Into<String>,
        resolver: &'a ModuleResolver,
        modules: &'a ModuleNameCache,
    ) -> Self {
        Self {
            repo,
            commit: commit.into(),
            host: host.into().trim_end_matches('/').to_string(),
            resolver,
            modules,
        }
    }

    /// Assembles every candidate, skipping those that can't be resolved.
    pub fn assemble(&self, candidates: &[ExternalReference]) -> Vec<Reference> {
        let mut references = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match self.assemble_one(candidate) {
                Ok(reference) => references.push(reference),
                Err(e @ XrefError::ModuleNotFound { .. }) => {
                    tracing::warn!("{}: dropping reference to {}: {}", candidate.file, candidate.symbol, e);
                }
                Err(e) => {
                    tracing::warn!(
                        "{}: couldn't assemble reference to {}.{}: {}",
                        candidate.file,
                        candidate.module,
                        candidate.symbol,
                        e
                    );
                }
            }
        }

        references
    }

    fn assemble_one(&self, candidate: &ExternalReference) -> Result<Reference> {
        let version = if candidate.package == self.repo {
            None
        } else {
            self.resolver
                .installed_version(&candidate.package)
                .map(str::to_string)
        };

        let resolved = self
            .resolver
            .resolve(&candidate.package, version.as_deref(), &candidate.module)?;

        let referred_fingerprint = version.as_deref().unwrap_or(&self.commit);
        let referred_module = self
            .modules
            .module_of(&resolved.absolute_path(), referred_fingerprint)?
            .or_else(|| Some(candidate.module.clone()));

        let referer_path = self.resolver.workdir().join(&candidate.file);
        let referer_module = self.modules.module_of(&referer_path, &self.commit)?;

        let url = self.url(&candidate.file, &candidate.region.line_anchor());
        let id = self.locator(candidate, &resolved.file);

        Ok(Reference {
            id,
            symbol: candidate.symbol.clone(),
            region: candidate.region,
            url,
            version,
            referer: FileRef {
                repo: self.repo.full_name(),
                file: candidate.file.clone(),
                module: referer_module,
            },
            referred: FileRef {
                repo: candidate.package.full_name(),
                file: resolved.file,
                module: referred_module,
            },
        })
    }

    fn url(&self, file: &str, anchor: &str) -> String {
        format!(
            "{}/{}/{}/blob/{}/{}#{}",
            self.host, self.repo.owner, self.repo.name, self.commit, file, anchor
        )
    }

    /// Stable id of a reference: hash of the referring location and the
    /// resolved target.
    fn locator(&self, candidate: &ExternalReference, referred_file: &str) -> String {
        let key = format!(
            "{}|{}|{}:{}-{}:{}|{}|{}|{}",
            self.repo,
            candidate.file,
            candidate.region.start.line,
            candidate.region.start.column,
            candidate.region.end.line,
            candidate.region.end.column,
            candidate.package,
            referred_file,
            candidate.symbol
        );
        format!("{:016x}", xxh3_64(key.as_bytes()))
    }
}
