use super::conflict::TransactionState;
use super::patch::{Identity, Patch, PatchName, PatchState};
use super::stack::{PendingConflict, Stack, StackStatus};
use crate::errors::{Result, StackError};
use crate::git::{self, ConflictInfo, GitRepository, MergeOutcome};
use git2::Oid;
use tracing::{debug, info};

/// Result of pushing one patch in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    Conflict(ConflictInfo),
}

/// In-memory rewrite of a stack.
///
/// Pops and pushes only create commits; nothing moves in the repository
/// until the resulting stack is materialized.
pub struct StackTransaction<'repo> {
    repo: &'repo GitRepository,
    stack: Stack,
    committer: Identity,
    state: TransactionState,
}

impl<'repo> StackTransaction<'repo> {
    pub fn begin(repo: &'repo GitRepository, stack: Stack, committer: Identity) -> Result<Self> {
        let state = TransactionState::of(&stack).begin()?;
        Ok(Self {
            repo,
            stack,
            committer,
            state,
        })
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn head_commit(&self) -> &str {
        self.stack.head_commit()
    }

    pub fn head_tree(&self) -> Result<Oid> {
        self.repo.commit_tree(self.stack.head_commit())
    }

    /// Pop every applied patch from `index` upward, keeping their order at
    /// the front of the unapplied list
    pub fn pop_from(&mut self, index: usize) -> Result<Vec<PatchName>> {
        let len = self.stack.applied.len();
        if index > len {
            return Err(StackError::command(format!(
                "cannot pop from position {index}, only {len} patches applied"
            )));
        }
        let popped = self
            .stack
            .replace_range(PatchState::Applied, index..len, Vec::new())?;
        let names: Vec<PatchName> = popped.iter().map(|p| p.name.clone()).collect();
        self.stack
            .replace_range(PatchState::Unapplied, 0..0, popped)?;
        debug!("Popped {:?}", names);
        Ok(names)
    }

    /// Push one unapplied patch onto the current top with a three-way merge
    pub fn push(&mut self, name: &PatchName) -> Result<PushOutcome> {
        let position = self.stack.unapplied_index(name.as_str()).ok_or_else(|| {
            if self.stack.is_applied(name.as_str()) {
                StackError::command(format!("patch `{name}` is already applied"))
            } else {
                StackError::NotFound(name.to_string())
            }
        })?;
        let mut patch = self.stack.unapplied[position].clone();
        let head = self.stack.head_commit().to_string();

        let parent = self.repo.parent_id(&patch.commit_id)?;
        if parent.as_deref() != Some(head.as_str()) {
            let diff = self.repo.diff(&patch.commit_id)?;
            match self.repo.merge_diff(self.repo.commit_tree(&head)?, &diff)? {
                MergeOutcome::Merged(tree) => {
                    patch.commit_id =
                        self.repo
                            .rewrite_commit(&patch.commit_id, &head, tree, &self.committer)?;
                }
                MergeOutcome::Conflicted(info) => {
                    debug!("Pushing `{}` conflicts in {:?}", name, info.paths);
                    return Ok(PushOutcome::Conflict(info));
                }
            }
        }

        self.stack
            .replace_range(PatchState::Unapplied, position..position + 1, Vec::new())?;
        let top = self.stack.applied.len();
        self.stack
            .replace_range(PatchState::Applied, top..top, vec![patch])?;
        debug!("Pushed `{}`", name);
        Ok(PushOutcome::Pushed)
    }

    /// Push patches in order, stopping at the first conflict.
    ///
    /// A conflict marks the stack conflicted on that patch; everything
    /// before it stays applied and everything after it stays unapplied.
    pub fn push_series(&mut self, names: &[PatchName]) -> Result<Option<PendingConflict>> {
        for name in names {
            if let PushOutcome::Conflict(info) = self.push(name)? {
                let pending = PendingConflict {
                    patch: name.clone(),
                    paths: info.paths,
                };
                self.mark_conflicted(pending.clone())?;
                return Ok(Some(pending));
            }
        }
        Ok(None)
    }

    fn mark_conflicted(&mut self, pending: PendingConflict) -> Result<()> {
        self.state = self.state.conflict()?;
        self.stack
            .set_status(StackStatus::Conflicted, Some(pending));
        Ok(())
    }

    /// Remove patches from the stack. Applied ones must form the top block.
    pub fn remove(&mut self, names: &[PatchName]) -> Result<Vec<Patch>> {
        let applied_count = names
            .iter()
            .filter(|n| self.stack.is_applied(n.as_str()))
            .count();
        let keep = self.stack.applied.len() - applied_count;
        if self.stack.applied[keep..]
            .iter()
            .any(|p| !names.contains(&p.name))
        {
            return Err(StackError::command(
                "only the topmost applied patches can be removed",
            ));
        }

        let len = self.stack.applied.len();
        let mut removed = self
            .stack
            .replace_range(PatchState::Applied, keep..len, Vec::new())?;
        for name in names {
            if let Some(position) = self.stack.unapplied_index(name.as_str()) {
                removed.extend(self.stack.replace_range(
                    PatchState::Unapplied,
                    position..position + 1,
                    Vec::new(),
                )?);
            }
        }
        Ok(removed)
    }

    /// Put a patch whose commit sits directly on the current top onto the stack
    pub fn append_applied(&mut self, patch: Patch) -> Result<()> {
        let parent = self.repo.parent_id(&patch.commit_id)?;
        if parent.as_deref() != Some(self.stack.head_commit()) {
            return Err(StackError::command(format!(
                "patch `{}` is not based on the stack top",
                patch.name
            )));
        }
        let top = self.stack.applied.len();
        self.stack
            .replace_range(PatchState::Applied, top..top, vec![patch])?;
        Ok(())
    }

    pub fn insert_unapplied(&mut self, index: usize, patch: Patch) -> Result<()> {
        self.stack
            .replace_range(PatchState::Unapplied, index..index, vec![patch])?;
        Ok(())
    }

    /// Abandon the rewrite; nothing was materialized so the repository is untouched
    pub fn roll_back(mut self) -> Result<()> {
        self.state = self.state.roll_back()?.settle()?;
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Finish the transaction and return the stack to materialize
    pub fn finish(mut self) -> Result<Stack> {
        self.state = match self.state {
            TransactionState::Conflicted => TransactionState::Conflicted,
            state => state.succeed()?,
        };
        self.stack.validate().map_err(StackError::command)?;
        Ok(self.stack)
    }
}

/// Point every patch ref at its commit and drop refs of patches that are gone
pub fn write_patch_refs(repo: &GitRepository, stack: &Stack) -> Result<()> {
    let prefix = git::patch_ref_prefix(&stack.branch);
    for patch in stack.iter() {
        repo.write_ref(
            &git::patch_ref(&stack.branch, patch.name.as_str()),
            &patch.commit_id,
            "patch-stack: update patch",
        )?;
    }
    for (refname, _) in repo.list_refs(&prefix)? {
        let Some(name) = refname.strip_prefix(&prefix) else {
            continue;
        };
        if !name.contains('/') && !stack.contains(name) {
            debug!("Deleting stale ref {}", refname);
            repo.delete_ref(&refname)?;
        }
    }
    Ok(())
}

/// Make the repository match `stack`: branch head, worktree, patch refs,
/// and conflict markers for a pending conflict.
///
/// With `force` set, local changes in the worktree are overwritten.
pub fn materialize(repo: &GitRepository, stack: &Stack, force: bool) -> Result<()> {
    stack.validate().map_err(StackError::command)?;

    repo.move_branch(&stack.branch, stack.head_commit(), force)?;
    write_patch_refs(repo, stack)?;

    if let (StackStatus::Conflicted, Some(pending)) = (stack.status, &stack.conflict) {
        let patch = stack.get(pending.patch.as_str())?;
        let paths = repo.write_conflicts(&patch.commit_id)?;
        info!(
            "Left conflict markers for `{}` in {}",
            pending.patch,
            paths.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use tempfile::TempDir;

    fn git(repo_path: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(repo_path)
            .output()
            .unwrap()
            .status;
        assert!(status.success(), "git {args:?} failed");
    }

    fn committer() -> Identity {
        Identity::new("Test", "test@test.com")
    }

    /// Repo with `base` plus one commit per entry, adopted as applied patches
    fn setup(files: &[(&str, &str, &str)]) -> (TempDir, PathBuf, GitRepository, Stack) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_path_buf();
        git(&path, &["init", "-q", "-b", "main"]);
        git(&path, &["config", "user.name", "Test"]);
        git(&path, &["config", "user.email", "test@test.com"]);
        std::fs::write(path.join("README.md"), "# Test\n").unwrap();
        git(&path, &["add", "."]);
        git(&path, &["commit", "-q", "-m", "base"]);

        let repo = GitRepository::open(&path).unwrap();
        let mut stack = Stack::new("main".to_string(), repo.get_head_commit_hash().unwrap());
        for (name, file, content) in files {
            std::fs::write(path.join(file), content).unwrap();
            git(&path, &["add", *file]);
            git(&path, &["commit", "-q", "-m", *name]);
            let head = repo.get_head_commit_hash().unwrap();
            let commit = repo.get_commit(&head).unwrap();
            stack.applied.push(Patch::from_commit(
                PatchName::new(*name).unwrap(),
                &commit,
                PatchState::Applied,
            ));
        }
        (temp_dir, path, repo, stack)
    }

    fn names(list: &[&str]) -> Vec<PatchName> {
        list.iter().map(|n| PatchName::new(*n).unwrap()).collect()
    }

    #[test]
    fn test_pop_and_push_reorders_in_memory() {
        let (_tmp, _path, repo, stack) =
            setup(&[("p0", "a.txt", "a\n"), ("p1", "b.txt", "b\n"), ("p2", "c.txt", "c\n")]);
        let head_before = repo.get_head_commit_hash().unwrap();

        let mut trans = StackTransaction::begin(&repo, stack, committer()).unwrap();
        assert_eq!(trans.pop_from(1).unwrap(), names(&["p1", "p2"]));
        assert_eq!(trans.push_series(&names(&["p2", "p1"])).unwrap(), None);

        let stack = trans.finish().unwrap();
        let order: Vec<_> = stack.applied().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["p0", "p2", "p1"]);
        assert_eq!(
            repo.parent_id(&stack.get("p2").unwrap().commit_id).unwrap().as_deref(),
            Some(stack.get("p0").unwrap().commit_id.as_str())
        );
        // nothing moved yet
        assert_eq!(repo.get_head_commit_hash().unwrap(), head_before);
    }

    #[test]
    fn test_push_without_rebase_keeps_commit() {
        let (_tmp, _path, repo, stack) = setup(&[("p0", "a.txt", "a\n"), ("p1", "b.txt", "b\n")]);
        let original = stack.get("p1").unwrap().commit_id.clone();

        let mut trans = StackTransaction::begin(&repo, stack, committer()).unwrap();
        trans.pop_from(1).unwrap();
        trans.push(&PatchName::new("p1").unwrap()).unwrap();
        assert_eq!(trans.stack().get("p1").unwrap().commit_id, original);
    }

    #[test]
    fn test_push_series_stops_at_conflict() {
        let (_tmp, _path, repo, stack) = setup(&[
            ("p0", "a.txt", "one\n"),
            ("p1", "a.txt", "two\n"),
            ("p2", "b.txt", "b\n"),
        ]);

        let mut trans = StackTransaction::begin(&repo, stack, committer()).unwrap();
        trans.pop_from(0).unwrap();
        let pending = trans
            .push_series(&names(&["p2", "p1", "p0"]))
            .unwrap()
            .unwrap();

        assert_eq!(pending.patch, "p1");
        assert_eq!(pending.paths, vec!["a.txt"]);
        assert_eq!(trans.state(), TransactionState::Conflicted);

        let stack = trans.finish().unwrap();
        assert_eq!(stack.status, StackStatus::Conflicted);
        let applied: Vec<_> = stack.applied().iter().map(|p| p.name.as_str()).collect();
        let unapplied: Vec<_> = stack.unapplied().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(applied, vec!["p2"]);
        assert_eq!(unapplied, vec!["p0", "p1"]);
    }

    #[test]
    fn test_remove_requires_top_block() {
        let (_tmp, _path, repo, stack) =
            setup(&[("p0", "a.txt", "a\n"), ("p1", "b.txt", "b\n"), ("p2", "c.txt", "c\n")]);

        let mut trans = StackTransaction::begin(&repo, stack, committer()).unwrap();
        assert!(trans.remove(&names(&["p0"])).is_err());
        let removed = trans.remove(&names(&["p2", "p1"])).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(trans.stack().len(), 1);
    }

    #[test]
    fn test_materialize_moves_branch_and_refs() {
        let (_tmp, path, repo, stack) = setup(&[("p0", "a.txt", "a\n"), ("p1", "b.txt", "b\n")]);

        let mut trans = StackTransaction::begin(&repo, stack, committer()).unwrap();
        trans.pop_from(1).unwrap();
        let stack = trans.finish().unwrap();
        materialize(&repo, &stack, false).unwrap();

        assert_eq!(
            repo.get_head_commit_hash().unwrap(),
            stack.get("p0").unwrap().commit_id
        );
        assert!(!path.join("b.txt").exists());
        assert_eq!(
            repo.read_ref("refs/patches/main/p1").unwrap().as_deref(),
            Some(stack.get("p1").unwrap().commit_id.as_str())
        );

        let mut trans = StackTransaction::begin(&repo, stack, committer()).unwrap();
        trans.remove(&names(&["p1"])).unwrap();
        let stack = trans.finish().unwrap();
        materialize(&repo, &stack, false).unwrap();
        assert_eq!(repo.read_ref("refs/patches/main/p1").unwrap(), None);
    }

    #[test]
    fn test_roll_back_leaves_repository_alone() {
        let (_tmp, _path, repo, stack) = setup(&[("p0", "a.txt", "a\n"), ("p1", "b.txt", "b\n")]);
        let head = repo.get_head_commit_hash().unwrap();

        let mut trans = StackTransaction::begin(&repo, stack, committer()).unwrap();
        trans.pop_from(0).unwrap();
        trans.roll_back().unwrap();
        assert_eq!(repo.get_head_commit_hash().unwrap(), head);
    }

    #[test]
    fn test_begin_refuses_conflicted_stack() {
        let (_tmp, _path, repo, mut stack) = setup(&[("p0", "a.txt", "a\n")]);
        stack.status = StackStatus::Conflicted;
        stack.conflict = Some(PendingConflict {
            patch: PatchName::new("p0").unwrap(),
            paths: Vec::new(),
        });
        assert!(StackTransaction::begin(&repo, stack, committer()).is_err());
    }
}
