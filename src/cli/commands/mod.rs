pub mod completions;
pub mod config;
pub mod init;
pub mod log;
pub mod push;
pub mod resolve;
pub mod squash;
pub mod status;
pub mod undo;

use crate::errors::{Result, StackError};
use crate::git::find_repository_root;
use crate::stack::{PatchName, StackManager};
use std::env;

/// Stack manager for the repository containing the current directory
pub(crate) fn open_manager() -> Result<StackManager> {
    let current_dir = env::current_dir()
        .map_err(|e| StackError::config(format!("Could not get current directory: {e}")))?;
    let repo_root = find_repository_root(&current_dir)?;
    tracing::debug!("Found Git repository at: {}", repo_root.display());
    StackManager::new(&repo_root)
}

/// Expand name prefixes against the current stack and validate the results
pub(crate) fn resolve_names(manager: &StackManager, args: &[String]) -> Result<Vec<PatchName>> {
    if args.is_empty() {
        return Ok(Vec::new());
    }
    let stack = manager.load_stack()?;
    let known: Vec<String> = stack.all_names().iter().map(|n| n.to_string()).collect();
    crate::cli::resolve::resolve_all(args, &known)?
        .into_iter()
        .map(|name| {
            if stack.contains(&name) {
                PatchName::new(name)
            } else {
                Err(StackError::NotFound(name))
            }
        })
        .collect()
}
