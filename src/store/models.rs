use serde::{Deserialize, Serialize};

use crate::compiler::Region;
use crate::package::PackageId;

/// One side of a reference edge: a file inside a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    /// `owner/name` of the repository or package.
    pub repo: String,
    /// Path relative to the repository or package root.
    pub file: String,
    pub module: Option<String>,
}

impl FileRef {
    /// Graph id of the file: `owner/name/path`.
    pub fn file_id(&self) -> String {
        format!("{}/{}", self.repo, self.file)
    }
}

/// A resolved use of `symbol` in `referer`, defined in `referred`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Stable locator derived from the referring location and the target.
    pub id: String,
    pub symbol: String,
    pub region: Region,
    pub url: String,
    /// Installed version of the referred package; `None` for self-references.
    pub version: Option<String>,
    pub referer: FileRef,
    pub referred: FileRef,
}

impl Reference {
    /// Graph id of the referenced symbol: the referred file id without its
    /// extension, followed by `.symbol`.
    pub fn symbol_id(&self) -> String {
        let file_id = self.referred.file_id();
        let stem = file_id
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&file_id);
        format!("{}.{}", stem, self.symbol)
    }
}

/// A period during which `owner_repo` declared `dependency_repo` at `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub owner_repo: String,
    pub dependency_repo: String,
    /// Resolved concrete version, or the raw range when it couldn't be resolved.
    pub version: String,
    pub version_range: String,
    /// Commit timestamp (ms since epoch) the interval starts at, inclusive.
    pub start: i64,
    /// Exclusive end; `None` while still declared at the latest commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

impl DependencyEdge {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Repository metadata supplied by the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoMetadata {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub stars: Option<u64>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

impl RepoMetadata {
    pub fn from_id(id: &PackageId) -> Self {
        Self {
            owner: id.owner.clone(),
            name: id.name.clone(),
            stars: None,
            last_updated: None,
            license: None,
        }
    }

    pub fn id(&self) -> PackageId {
        PackageId::new(&self.owner, &self.name)
    }
}

/// Entry of a repository list file: a bare `owner/name` or full metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RepoEntry {
    FullName(String),
    Metadata(RepoMetadata),
}

impl RepoEntry {
    pub fn into_metadata(self) -> crate::error::Result<RepoMetadata> {
        match self {
            RepoEntry::FullName(full_name) => Ok(RepoMetadata::from_id(&PackageId::parse(&full_name)?)),
            RepoEntry::Metadata(meta) => Ok(meta),
        }
    }
}

/// First and last commit timestamps of a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoTimestamps {
    pub created: Option<i64>,
    pub last_commit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Position;

    fn reference() -> Reference {
        Reference {
            id: "abc".into(),
            symbol: "map".into(),
            region: Region {
                start: Position { line: 1, column: 1 },
                end: Position { line: 1, column: 4 },
            },
            url: "https://github.com/me/app/blob/h/src/Main.elm#L1".into(),
            version: Some("5.1.1".into()),
            referer: FileRef {
                repo: "me/app".into(),
                file: "src/Main.elm".into(),
                module: Some("Main".into()),
            },
            referred: FileRef {
                repo: "elm-lang/core".into(),
                file: "src/List.elm".into(),
                module: Some("List".into()),
            },
        }
    }

    #[test]
    fn test_graph_ids() {
        let r = reference();
        assert_eq!(r.referer.file_id(), "me/app/src/Main.elm");
        assert_eq!(r.symbol_id(), "elm-lang/core/src/List.map");
    }

    #[test]
    fn test_dependency_edge_json_shape() {
        let edge = DependencyEdge {
            owner_repo: "me/app".into(),
            dependency_repo: "elm-lang/core".into(),
            version: "5.1.1".into(),
            version_range: "5.0.0 <= v < 6.0.0".into(),
            start: 10,
            end: None,
        };
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["ownerRepo"], "me/app");
        assert_eq!(json["versionRange"], "5.0.0 <= v < 6.0.0");
        assert!(json.get("end").is_none());
    }

    #[test]
    fn test_repo_entry_forms() {
        let entries: Vec<RepoEntry> = serde_json::from_str(
            r#"["rtfeldman/elm-spa-example", {"owner": "elm-lang", "name": "core", "stars": 12}]"#,
        )
        .unwrap();
        let metas: Vec<RepoMetadata> = entries
            .into_iter()
            .map(|e| e.into_metadata().unwrap())
            .collect();

        assert_eq!(metas[0].id(), PackageId::new("rtfeldman", "elm-spa-example"));
        assert_eq!(metas[1].stars, Some(12));
    }
}
