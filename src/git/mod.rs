pub mod repository;

pub use repository::{ConflictInfo, GitRepository, MergeOutcome, TreeDiff};

use crate::errors::{Result, StackError};
use std::path::{Path, PathBuf};

/// Ref namespace holding one ref per patch of a branch's stack
pub fn patch_ref_prefix(branch: &str) -> String {
    format!("refs/patches/{branch}/")
}

/// Full ref name of a patch
pub fn patch_ref(branch: &str, patch: &str) -> String {
    format!("{}{}", patch_ref_prefix(branch), patch)
}

/// Find the root of the Git repository
pub fn find_repository_root(start_path: &Path) -> Result<PathBuf> {
    let repo = git2::Repository::discover(start_path)
        .map_err(|e| StackError::config(format!("Not a git repository: {e}")))?;

    let workdir = repo
        .workdir()
        .ok_or_else(|| StackError::config("Repository has no working directory (bare repo?)"))?;

    Ok(workdir.to_path_buf())
}

/// Get the current working directory as a Git repository
pub fn get_current_repository() -> Result<GitRepository> {
    let current_dir = std::env::current_dir()
        .map_err(|e| StackError::config(format!("Could not get current directory: {e}")))?;

    let repo_root = find_repository_root(&current_dir)?;
    GitRepository::open(&repo_root)
}
