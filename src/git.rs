//! Git repository discovery and the workspace fingerprint.
//!
//! The index cache is stamped with the commit HEAD points at, so switching
//! branches, pulling, or committing edited records makes the persisted index
//! stale and forces a rebuild from the task records.

use std::path::{Path, PathBuf};

use git2::{ErrorCode, Repository};
use tracing::debug;

use crate::error::Result;

/// Discover a git repository from a starting path.
///
/// Returns `Ok(None)` when `start` is not inside a repository.
pub fn discover_repo(start: &Path) -> Result<Option<Repository>> {
    match Repository::discover(start) {
        Ok(repo) => Ok(Some(repo)),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Return the repository workdir (root of the working tree), if not bare.
pub fn workdir(repo: &Repository) -> Option<PathBuf> {
    repo.workdir().map(Path::to_path_buf)
}

/// Working tree root of the repository enclosing `start`, if any.
pub fn enclosing_workdir(start: &Path) -> Option<PathBuf> {
    match discover_repo(start) {
        Ok(Some(repo)) => workdir(&repo),
        Ok(None) => None,
        Err(err) => {
            debug!(path = %start.display(), error = %err, "git discovery failed");
            None
        }
    }
}

/// Hex id of the commit HEAD points at, or `""` without a usable checkout.
///
/// Never fails: a missing repository, a bare repository, an unborn HEAD and
/// any libgit2 error all degrade to the empty fingerprint.
pub fn workspace_fingerprint(path: &Path) -> String {
    match head_oid(path) {
        Ok(Some(oid)) => oid,
        Ok(None) => String::new(),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "no workspace fingerprint");
            String::new()
        }
    }
}

fn head_oid(path: &Path) -> Result<Option<String>> {
    let Some(repo) = discover_repo(path)? else {
        return Ok(None);
    };
    if repo.is_bare() {
        return Ok(None);
    }
    let head = match repo.head() {
        Ok(head) => head,
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    let commit = head.peel_to_commit()?;
    Ok(Some(commit.id().to_string()))
}
