use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, XrefError};
use crate::package::Manifest;

use super::{Commit, HistorySource};

/// A local clone driven through the `git` binary.
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    /// Opens an existing clone.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let output = Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(&path)
            .output()
            .map_err(|e| XrefError::Git(format!("Failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(XrefError::Git(format!(
                "Not a git repository: {}",
                path.display()
            )));
        }

        Ok(Self { path })
    }

    /// Clones `url` into `path`, or refreshes an existing clone there to the
    /// tip of the remote's default branch.
    pub fn clone_or_pull(url: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.join(".git").is_dir() {
            tracing::debug!("refreshing {} in {}", url, path.display());
            let repo = Self::open(path)?;
            repo.refresh()?;
            return Ok(repo);
        }

        tracing::debug!("cloning {} into {}", url, path.display());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let target = path.to_string_lossy();
        let cwd = path.parent().unwrap_or_else(|| Path::new("."));
        run_git(cwd, &["clone", "--quiet", url, &target])?;

        Self::open(path)
    }

    /// Fetches `origin` and force-checks-out its default branch. Works from
    /// any state a history walk may have left behind, detached HEAD included.
    fn refresh(&self) -> Result<()> {
        run_git(&self.path, &["fetch", "--quiet", "origin"])?;

        let remote_head = match self.remote_head() {
            Ok(remote_head) => remote_head,
            Err(_) => {
                run_git(&self.path, &["remote", "set-head", "origin", "--auto"])?;
                self.remote_head()?
            }
        };
        let branch = remote_head.strip_prefix("origin/").unwrap_or(&remote_head);

        run_git(
            &self.path,
            &["checkout", "--force", "--quiet", "-B", branch, &remote_head],
        )?;
        Ok(())
    }

    /// `origin/<default branch>`.
    fn remote_head(&self) -> Result<String> {
        let remote_head = run_git(
            &self.path,
            &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"],
        )?;
        Ok(remote_head.trim().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hash of the checked-out commit.
    pub fn head(&self) -> Result<String> {
        Ok(run_git(&self.path, &["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Name of the checked-out branch, `None` when detached.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let branch = run_git(&self.path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = branch.trim();
        Ok((branch != "HEAD" && !branch.is_empty()).then(|| branch.to_string()))
    }

    /// Every commit reachable from HEAD, oldest first, with committer
    /// timestamps in milliseconds.
    pub fn log(&self) -> Result<Vec<Commit>> {
        let stdout = run_git(&self.path, &["log", "--reverse", "--format=%H %ct"])?;
        Ok(parse_log(&stdout))
    }

    pub fn checkout_ref(&self, rev: &str) -> Result<()> {
        run_git(&self.path, &["checkout", "--force", "--quiet", rev])?;
        Ok(())
    }

    /// Whether the working tree has no uncommitted or untracked changes.
    pub fn is_clean(&self) -> Result<bool> {
        Ok(run_git(&self.path, &["status", "--porcelain"])?
            .trim()
            .is_empty())
    }

    /// Runs `walk`, then checks the original branch (or commit, when
    /// detached) out again whether or not the walk succeeded.
    pub fn with_restored_checkout<T>(
        &mut self,
        walk: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let original = match self.current_branch()? {
            Some(branch) => branch,
            None => self.head()?,
        };

        let result = walk(self);
        if let Err(e) = self.checkout_ref(&original) {
            tracing::warn!(
                "Couldn't restore {} to {}: {}",
                self.path.display(),
                original,
                e
            );
        }
        result
    }
}

impl HistorySource for GitRepository {
    fn commits(&mut self) -> Result<Vec<Commit>> {
        self.log()
    }

    fn checkout(&mut self, commit: &Commit) -> Result<()> {
        self.checkout_ref(&commit.hash)
    }

    fn read_manifest(&self) -> Result<Option<Manifest>> {
        Manifest::read_optional(&self.path)
    }
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| XrefError::Git(format!("Failed to run git {}: {}", args[0], e)))?;

    if !output.status.success() {
        return Err(XrefError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `%H %ct` lines. Malformed lines are skipped.
fn parse_log(stdout: &str) -> Vec<Commit> {
    stdout
        .lines()
        .filter_map(|line| {
            let (hash, seconds) = line.trim().split_once(' ')?;
            let seconds: i64 = seconds.trim().parse().ok()?;
            Some(Commit {
                hash: hash.to_string(),
                timestamp: seconds * 1000,
            })
        })
        .collect()
}
