use crate::errors::{Result, StackError};
use crate::stack::patch::Identity;
use git2::build::CheckoutBuilder;
use git2::{Oid, Repository, Signature};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The change a patch commit introduces: parent tree to commit tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeDiff {
    pub from_tree: Oid,
    pub to_tree: Oid,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.from_tree == self.to_tree
    }
}

/// Paths left conflicted by a three-way merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictInfo {
    pub paths: Vec<String>,
}

/// Result of applying a diff onto a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(Oid),
    Conflicted(ConflictInfo),
}

/// Wrapper around git2::Repository exposing the store operations the stack needs
pub struct GitRepository {
    repo: Repository,
    path: PathBuf,
}

impl GitRepository {
    /// Open a Git repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| StackError::config(format!("Not a git repository: {e}")))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| StackError::config("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self {
            repo,
            path: workdir,
        })
    }

    /// Get repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-worktree git directory
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Get the current branch name; detached HEAD is an error
    pub fn get_current_branch(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| StackError::command(format!("Could not get HEAD: {e}")))?;

        if !head.is_branch() {
            return Err(StackError::command("HEAD is detached; check out a branch first"));
        }
        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| StackError::command("Branch name is not valid UTF-8"))
    }

    /// Get the HEAD commit hash
    pub fn get_head_commit_hash(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| StackError::command(format!("Could not get HEAD: {e}")))?;

        let commit = head
            .peel_to_commit()
            .map_err(|e| StackError::command(format!("Could not get HEAD commit: {e}")))?;

        Ok(commit.id().to_string())
    }

    /// Check for tracked modifications in the index or working tree.
    /// Untracked files do not count.
    pub fn is_dirty(&self) -> Result<bool> {
        let mut options = git2::StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;

        Ok(statuses.iter().any(|status| {
            status.status().intersects(
                git2::Status::INDEX_MODIFIED
                    | git2::Status::INDEX_NEW
                    | git2::Status::INDEX_DELETED
                    | git2::Status::INDEX_RENAMED
                    | git2::Status::INDEX_TYPECHANGE
                    | git2::Status::WT_MODIFIED
                    | git2::Status::WT_DELETED
                    | git2::Status::WT_RENAMED
                    | git2::Status::WT_TYPECHANGE
                    | git2::Status::CONFLICTED,
            )
        }))
    }

    /// Check for merge conflicts in the index
    pub fn has_conflicts(&self) -> Result<bool> {
        let index = self.repo.index()?;
        Ok(index.has_conflicts())
    }

    /// Get list of conflicted files
    pub fn get_conflicted_files(&self) -> Result<Vec<String>> {
        let index = self.repo.index()?;
        conflict_paths(&index)
    }

    /// Get a commit object by hash
    pub fn get_commit(&self, commit_hash: &str) -> Result<git2::Commit<'_>> {
        let oid = Oid::from_str(commit_hash)?;
        self.repo.find_commit(oid).map_err(|e| {
            StackError::command(format!("Could not find commit '{commit_hash}': {e}"))
        })
    }

    /// Tree id of a commit
    pub fn commit_tree(&self, commit_hash: &str) -> Result<Oid> {
        Ok(self.get_commit(commit_hash)?.tree_id())
    }

    /// First parent of a commit
    pub fn parent_id(&self, commit_hash: &str) -> Result<Option<String>> {
        let commit = self.get_commit(commit_hash)?;
        Ok(commit.parent_ids().next().map(|oid| oid.to_string()))
    }

    /// Diff a patch commit introduces relative to its first parent
    pub fn diff(&self, commit_hash: &str) -> Result<TreeDiff> {
        let commit = self.get_commit(commit_hash)?;
        let from_tree = match commit.parents().next() {
            Some(parent) => parent.tree_id(),
            None => self.empty_tree()?,
        };
        Ok(TreeDiff {
            from_tree,
            to_tree: commit.tree_id(),
        })
    }

    fn empty_tree(&self) -> Result<Oid> {
        Ok(self.repo.treebuilder(None)?.write()?)
    }

    /// Apply `diff` onto `onto` with a three-way merge
    pub fn merge_diff(&self, onto: Oid, diff: &TreeDiff) -> Result<MergeOutcome> {
        if diff.is_empty() {
            return Ok(MergeOutcome::Merged(onto));
        }
        if diff.from_tree == onto {
            return Ok(MergeOutcome::Merged(diff.to_tree));
        }

        let ancestor = self.repo.find_tree(diff.from_tree)?;
        let ours = self.repo.find_tree(onto)?;
        let theirs = self.repo.find_tree(diff.to_tree)?;

        let mut index = self.repo.merge_trees(&ancestor, &ours, &theirs, None)?;
        if index.has_conflicts() {
            let paths = conflict_paths(&index)?;
            debug!("Merge of {} onto {} conflicts in {:?}", diff.to_tree, onto, paths);
            return Ok(MergeOutcome::Conflicted(ConflictInfo { paths }));
        }

        let tree = index.write_tree_to(&self.repo)?;
        Ok(MergeOutcome::Merged(tree))
    }

    /// Create a commit without moving any ref
    pub fn create_commit(
        &self,
        tree: Oid,
        parent: &str,
        author: &Identity,
        committer: &Identity,
        message: &str,
    ) -> Result<String> {
        let tree = self.repo.find_tree(tree)?;
        let parent = self.get_commit(parent)?;
        let author = Signature::now(&author.name, &author.email)?;
        let committer = Signature::now(&committer.name, &committer.email)?;

        let commit_id = self
            .repo
            .commit(None, &author, &committer, message, &tree, &[&parent])?;

        debug!("Created commit {}", commit_id);
        Ok(commit_id.to_string())
    }

    /// Recreate a commit on a new parent with a new tree, keeping author and message
    pub fn rewrite_commit(
        &self,
        original: &str,
        parent: &str,
        tree: Oid,
        committer: &Identity,
    ) -> Result<String> {
        let original = self.get_commit(original)?;
        let tree = self.repo.find_tree(tree)?;
        let parent = self.get_commit(parent)?;
        let committer = Signature::now(&committer.name, &committer.email)?;
        let message = String::from_utf8_lossy(original.message_bytes()).into_owned();

        let commit_id = self.repo.commit(
            None,
            &original.author(),
            &committer,
            &message,
            &tree,
            &[&parent],
        )?;
        Ok(commit_id.to_string())
    }

    /// Resolve a ref to a commit hash
    pub fn read_ref(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_reference(name) {
            Ok(reference) => Ok(reference.target().map(|oid| oid.to_string())),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Point a ref at a commit, creating it if needed
    pub fn write_ref(&self, name: &str, commit_hash: &str, log_message: &str) -> Result<()> {
        let oid = Oid::from_str(commit_hash)?;
        self.repo.reference(name, oid, true, log_message)?;
        Ok(())
    }

    pub fn delete_ref(&self, name: &str) -> Result<()> {
        match self.repo.find_reference(name) {
            Ok(mut reference) => Ok(reference.delete()?),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Refs under a prefix as (name, target) pairs
    pub fn list_refs(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let glob = format!("{}*", prefix);
        let mut refs = Vec::new();
        for reference in self.repo.references_glob(&glob)? {
            let reference = reference?;
            if let (Some(name), Some(target)) = (reference.name(), reference.target()) {
                refs.push((name.to_string(), target.to_string()));
            }
        }
        Ok(refs)
    }

    /// Get the commit hash at the head of a branch
    pub fn get_branch_head(&self, branch_name: &str) -> Result<String> {
        self.read_ref(&format!("refs/heads/{branch_name}"))?
            .ok_or_else(|| StackError::command(format!("Could not find branch '{branch_name}'")))
    }

    /// Move a branch and make the index and working tree match it.
    ///
    /// With `force` unset the checkout refuses to overwrite local changes.
    pub fn move_branch(&self, branch: &str, commit_hash: &str, force: bool) -> Result<()> {
        let refname = format!("refs/heads/{branch}");
        let commit = self.get_commit(commit_hash)?;

        let mut checkout = CheckoutBuilder::new();
        if force {
            checkout.force();
        } else {
            checkout.safe();
        }
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut checkout))
            .map_err(|e| {
                StackError::command(format!("Could not check out commit '{commit_hash}': {e}"))
            })?;

        self.repo
            .reference(&refname, commit.id(), true, "patch-stack: move branch")?;
        self.repo.set_head(&refname)?;

        if force {
            // checkout_tree leaves conflict entries from an earlier merge in place
            let mut index = self.repo.index()?;
            index.read_tree(&commit.tree()?)?;
            index.write()?;
        }

        debug!("Moved {} to {}", branch, commit_hash);
        Ok(())
    }

    /// Discard index conflicts and working tree changes, keeping HEAD
    pub fn reset_hard(&self) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo
            .reset(head.as_object(), git2::ResetType::Hard, Some(&mut checkout))?;
        debug!("Hard reset to {}", head.id());
        Ok(())
    }

    /// Replay `commit_hash` onto HEAD in the index and working tree, leaving
    /// conflict markers for the user to resolve.
    pub fn write_conflicts(&self, commit_hash: &str) -> Result<Vec<String>> {
        let commit = self.get_commit(commit_hash)?;

        let mut checkout = CheckoutBuilder::new();
        checkout
            .allow_conflicts(true)
            .conflict_style_merge(true)
            .force();
        let mut options = git2::CherrypickOptions::new();
        options.checkout_builder(checkout);

        self.repo.cherrypick(&commit, Some(&mut options))?;
        // Not a git cherry-pick session; only the index and worktree matter
        self.repo.cleanup_state()?;

        self.get_conflicted_files()
    }

    /// Write the current index as a tree
    pub fn write_index_tree(&self) -> Result<Oid> {
        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            return Err(StackError::command(
                "the index still has conflicts; resolve them and `git add` the files",
            ));
        }
        Ok(index.write_tree()?)
    }

    /// Identity configured as `user.name` / `user.email`
    pub fn default_identity(&self) -> Result<Identity> {
        let config = self.repo.config()?;
        match (
            config.get_string("user.name"),
            config.get_string("user.email"),
        ) {
            (Ok(name), Ok(email)) => Ok(Identity::new(name, email)),
            _ => Err(StackError::config(
                "no author identity configured; set user.name and user.email or author.name and author.email",
            )),
        }
    }

    /// Value of a git config key
    pub fn config_string(&self, key: &str) -> Option<String> {
        self.repo.config().ok()?.get_string(key).ok()
    }

    /// Walk first parents from HEAD, newest first
    pub fn first_parent_chain(&self, from: &str, count: usize) -> Result<Vec<String>> {
        let mut chain = Vec::with_capacity(count);
        let mut current = Some(self.get_commit(from)?);
        while chain.len() < count {
            let Some(commit) = current else {
                return Err(StackError::command(format!(
                    "branch has fewer than {count} commits"
                )));
            };
            if commit.parent_count() > 1 {
                return Err(StackError::command(format!(
                    "cannot adopt merge commit {}",
                    commit.id()
                )));
            }
            chain.push(commit.id().to_string());
            current = commit.parents().next();
        }
        Ok(chain)
    }
}

fn conflict_paths(index: &git2::Index) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict
            .our
            .as_ref()
            .or(conflict.their.as_ref())
            .or(conflict.ancestor.as_ref());
        if let Some(entry) = entry {
            paths.push(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}
