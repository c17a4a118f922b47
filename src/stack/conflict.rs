use super::patch::{Identity, Patch, PatchState};
use super::stack::{Stack, StackStatus};
use crate::errors::{Result, StackError};
use crate::git::GitRepository;
use std::fmt;
use tracing::{debug, info};

/// Lifecycle of one stack transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Clean,
    MergeInProgress,
    Conflicted,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Clean => "clean",
            TransactionState::MergeInProgress => "merge in progress",
            TransactionState::Conflicted => "conflicted",
            TransactionState::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

impl TransactionState {
    fn transition(self, event: &str, allowed: bool, next: TransactionState) -> Result<Self> {
        if allowed {
            debug!("Transaction {} -> {} ({})", self, next, event);
            Ok(next)
        } else {
            Err(StackError::command(format!(
                "cannot {event} a transaction that is {self}"
            )))
        }
    }

    /// Clean -> MergeInProgress
    pub fn begin(self) -> Result<Self> {
        self.transition(
            "begin",
            self == TransactionState::Clean,
            TransactionState::MergeInProgress,
        )
    }

    /// MergeInProgress -> Clean
    pub fn succeed(self) -> Result<Self> {
        self.transition(
            "commit",
            self == TransactionState::MergeInProgress,
            TransactionState::Clean,
        )
    }

    /// MergeInProgress -> Conflicted
    pub fn conflict(self) -> Result<Self> {
        self.transition(
            "record a conflict in",
            self == TransactionState::MergeInProgress,
            TransactionState::Conflicted,
        )
    }

    /// MergeInProgress | Conflicted -> RolledBack
    pub fn roll_back(self) -> Result<Self> {
        self.transition(
            "roll back",
            matches!(
                self,
                TransactionState::MergeInProgress | TransactionState::Conflicted
            ),
            TransactionState::RolledBack,
        )
    }

    /// RolledBack -> Clean
    pub fn settle(self) -> Result<Self> {
        self.transition(
            "settle",
            self == TransactionState::RolledBack,
            TransactionState::Clean,
        )
    }

    /// Conflicted -> Clean, after the user resolved the conflict by hand
    pub fn resolved(self) -> Result<Self> {
        self.transition(
            "resolve",
            self == TransactionState::Conflicted,
            TransactionState::Clean,
        )
    }

    /// Transaction state implied by a persisted stack
    pub fn of(stack: &Stack) -> Self {
        match stack.status {
            StackStatus::Clean => TransactionState::Clean,
            StackStatus::Conflicted => TransactionState::Conflicted,
        }
    }
}

/// Refuse to start a transaction unless the stack and worktree are consistent
pub fn guard(repo: &GitRepository, stack: &Stack) -> Result<()> {
    if let (StackStatus::Conflicted, Some(conflict)) = (stack.status, &stack.conflict) {
        return Err(StackError::command(format!(
            "unresolved conflicts from pushing `{}`; run `pst resolve` or `pst undo --hard`",
            conflict.patch
        )));
    }
    if repo.has_conflicts()? {
        return Err(StackError::command(
            "unresolved conflicts in the index; resolve them first",
        ));
    }
    if repo.is_dirty()? {
        return Err(StackError::command(
            "local changes in the working tree; commit or discard them first",
        ));
    }
    let head = repo.get_branch_head(&stack.branch)?;
    if head != stack.head_commit() {
        return Err(StackError::command("HEAD and top are not the same"));
    }
    Ok(())
}

/// Commit the resolved index as the patch whose push conflicted.
///
/// Returns the new stack state and the now-applied patch.
pub fn resolve(repo: &GitRepository, stack: &Stack, committer: &Identity) -> Result<(Stack, Patch)> {
    let pending = match (stack.status, &stack.conflict) {
        (StackStatus::Conflicted, Some(conflict)) => conflict.clone(),
        _ => return Err(StackError::command("no conflict to resolve")),
    };
    let state = TransactionState::of(stack);

    if repo.has_conflicts()? {
        let paths = repo.get_conflicted_files()?;
        return Err(StackError::command(format!(
            "unresolved conflicts in {}; edit them and `git add` the result",
            paths.join(", ")
        )));
    }
    if repo.get_branch_head(&stack.branch)? != stack.head_commit() {
        return Err(StackError::command("HEAD and top are not the same"));
    }

    let position = stack
        .unapplied_index(pending.patch.as_str())
        .ok_or_else(|| StackError::NotFound(pending.patch.to_string()))?;
    let mut patch = stack.unapplied[position].clone();

    let tree = repo.write_index_tree()?;
    patch.commit_id = repo.rewrite_commit(&patch.commit_id, stack.head_commit(), tree, committer)?;

    let mut next = stack.clone();
    next.set_status(StackStatus::Clean, None);
    next.replace_range(PatchState::Unapplied, position..position + 1, Vec::new())?;
    let top = next.applied.len();
    next.replace_range(PatchState::Applied, top..top, vec![patch])?;
    state.resolved()?;

    let patch = next.get(pending.patch.as_str())?.clone();
    info!("Resolved conflicts in `{}` as {}", patch.name, patch.short_hash());
    Ok((next, patch))
}
