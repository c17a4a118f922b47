use super::conflict;
use super::log::{SnapshotId, SnapshotLog};
use super::patch::{Identity, Patch, PatchName, PatchState};
use super::planner;
use super::squash::{self, SquashContext, SquashRequest};
use super::stack::{PendingConflict, Stack};
use super::transaction::{self, StackTransaction};
use crate::config::{self, Settings};
use crate::errors::{Result, StackError};
use crate::git::GitRepository;
use crate::utils::editor::MessageEditor;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const STACK_FILE_NAME: &str = "stack.json";
const LOG_FILE_NAME: &str = "log.jsonl";

/// Loads, persists and rewrites the stack of the current branch
pub struct StackManager {
    /// Git repository interface
    repo: GitRepository,
    /// Layered global and repository settings
    settings: Settings,
    /// Root of persisted stack state, one subdirectory per branch
    storage_dir: PathBuf,
}

impl StackManager {
    /// Create a new StackManager for the given repository
    pub fn new(repo_path: &Path) -> Result<Self> {
        let repo = GitRepository::open(repo_path)?;
        let settings = config::load_settings(repo.git_dir())?;
        let storage_dir = match &settings.stack.storage_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => repo.path().join(dir),
            None => config::get_repo_config_dir(repo.git_dir()),
        };
        debug!("Stack storage at {}", storage_dir.display());

        Ok(Self {
            repo,
            settings,
            storage_dir,
        })
    }

    pub fn repository(&self) -> &GitRepository {
        &self.repo
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Author for multi-author squashes and committer of rewritten patches
    pub fn default_identity(&self) -> Result<Identity> {
        match self.settings.author_identity() {
            Some(identity) => Ok(identity),
            None => self.repo.default_identity(),
        }
    }

    /// Squash context built from settings with the given editor
    pub fn squash_context(&self, editor: Box<dyn MessageEditor>) -> Result<SquashContext> {
        Ok(SquashContext {
            default_identity: self.default_identity()?,
            name_length: self.settings.stack.name_length(),
            editor,
        })
    }

    fn branch_dir(&self, branch: &str) -> PathBuf {
        self.storage_dir.join(branch)
    }

    fn stack_file(&self, branch: &str) -> PathBuf {
        self.branch_dir(branch).join(STACK_FILE_NAME)
    }

    pub fn is_initialized(&self, branch: &str) -> bool {
        self.stack_file(branch).exists()
    }

    /// Load the stack of the checked-out branch
    pub fn load_stack(&self) -> Result<Stack> {
        let branch = self.repo.get_current_branch()?;
        let path = self.stack_file(&branch);
        if !path.exists() {
            return Err(StackError::command(format!(
                "branch `{branch}` has no patch stack; run `pst init` first"
            )));
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| StackError::config(format!("Failed to read stack file: {e}")))?;
        let stack: Stack = serde_json::from_str(&content)
            .map_err(|e| StackError::config(format!("Failed to parse stack file: {e}")))?;
        stack
            .validate()
            .map_err(|e| StackError::config(format!("Stack file is inconsistent: {e}")))?;
        Ok(stack)
    }

    pub fn save_stack(&self, stack: &Stack) -> Result<()> {
        let dir = self.branch_dir(&stack.branch);
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                StackError::config(format!("Failed to create stack directory: {e}"))
            })?;
        }
        crate::utils::atomic_file::write_json(&self.stack_file(&stack.branch), stack)
    }

    pub fn open_log(&self, branch: &str) -> Result<SnapshotLog> {
        SnapshotLog::open(&self.branch_dir(branch).join(LOG_FILE_NAME))
    }

    /// Materialize, persist and log the outcome of an operation
    pub(crate) fn commit(
        &self,
        log: &mut SnapshotLog,
        stack: &Stack,
        operation: &str,
        prev: Option<SnapshotId>,
    ) -> Result<SnapshotId> {
        transaction::materialize(&self.repo, stack, false)?;
        self.save_stack(stack)?;
        log.append(stack, operation, prev)
    }

    /// Start a stack on the current branch, turning the top `adopt` commits into patches
    pub fn initialize(&self, adopt: usize) -> Result<Stack> {
        let branch = self.repo.get_current_branch()?;
        if self.is_initialized(&branch) {
            return Err(StackError::command(format!(
                "branch `{branch}` already has a patch stack"
            )));
        }

        let head = self.repo.get_head_commit_hash()?;
        let mut chain = self.repo.first_parent_chain(&head, adopt)?;
        chain.reverse();

        let base = match chain.first() {
            Some(oldest) => self.repo.parent_id(oldest)?.ok_or_else(|| {
                StackError::command("cannot adopt the root commit; it has no parent to use as base")
            })?,
            None => head,
        };

        let mut stack = Stack::new(branch.clone(), base);
        for commit_id in &chain {
            let commit = self.repo.get_commit(commit_id)?;
            let message = String::from_utf8_lossy(commit.message_bytes()).into_owned();
            let name = PatchName::slug(&message, self.settings.stack.name_length())
                .uniquify(|candidate| stack.contains(candidate.as_str()));
            let patch = Patch::from_commit(name, &commit, PatchState::Applied);
            let top = stack.applied.len();
            stack.replace_range(PatchState::Applied, top..top, vec![patch])?;
        }

        transaction::write_patch_refs(&self.repo, &stack)?;
        self.save_stack(&stack)?;
        self.open_log(&branch)?.append(&stack, "init", None)?;

        info!("Initialized stack on `{}` with {} patches", branch, stack.len());
        Ok(stack)
    }

    /// Push `names` in order, the next patch when empty, or everything with `all`
    pub fn push(&self, names: &[PatchName], all: bool) -> Result<Vec<PatchName>> {
        let stack = self.load_stack()?;
        conflict::guard(&self.repo, &stack)?;

        let to_push = if all {
            if stack.unapplied.is_empty() {
                return Err(StackError::command("no patches to push"));
            }
            stack.unapplied.iter().map(|p| p.name.clone()).collect()
        } else {
            planner::plan_push(&stack, names)?
        };

        let mut log = self.open_log(&stack.branch)?;
        let before = log.capture(&stack, "push")?;
        let mut trans = StackTransaction::begin(&self.repo, stack, self.default_identity()?)?;

        let pending = trans.push_series(&to_push)?;
        self.finish(&mut log, trans, "push", before, pending)?;
        info!("Pushed {} patches", to_push.len());
        Ok(to_push)
    }

    /// Pop `names`, the top patch when empty, or everything with `all`.
    ///
    /// Patches above a popped one that were not named are pushed back.
    pub fn pop(&self, names: &[PatchName], all: bool) -> Result<Vec<PatchName>> {
        let stack = self.load_stack()?;
        conflict::guard(&self.repo, &stack)?;

        let plan = if all {
            if stack.applied.is_empty() {
                return Err(StackError::command("no patches applied"));
            }
            planner::PopPlan {
                site_index: 0,
                pop: stack.applied.iter().map(|p| p.name.clone()).collect(),
                repush: Vec::new(),
            }
        } else {
            planner::plan_pop(&stack, names)?
        };

        let mut log = self.open_log(&stack.branch)?;
        let before = log.capture(&stack, "pop")?;
        let mut trans = StackTransaction::begin(&self.repo, stack, self.default_identity()?)?;

        trans.pop_from(plan.site_index)?;
        let pending = trans.push_series(&plan.repush)?;
        self.finish(&mut log, trans, "pop", before, pending)?;

        let popped: Vec<PatchName> = plan
            .pop
            .into_iter()
            .filter(|name| !plan.repush.contains(name))
            .collect();
        info!("Popped {} patches", popped.len());
        Ok(popped)
    }

    fn finish(
        &self,
        log: &mut SnapshotLog,
        trans: StackTransaction<'_>,
        operation: &str,
        before: SnapshotId,
        conflict: Option<PendingConflict>,
    ) -> Result<()> {
        let stack = trans.finish()?;
        match conflict {
            None => {
                self.commit(log, &stack, operation, Some(before))?;
                Ok(())
            }
            Some(pending) => {
                self.commit(log, &stack, &format!("{operation} (conflict)"), Some(before))?;
                Err(StackError::conflict(
                    format!("conflicts while pushing `{}`", pending.patch),
                    pending.patch.to_string(),
                    pending.paths,
                ))
            }
        }
    }

    /// Combine patches into one; see [`squash::squash`]
    pub fn squash(&self, request: &SquashRequest, context: &SquashContext) -> Result<Patch> {
        squash::squash(self, request, context)
    }

    /// Step back through the snapshot log
    pub fn undo(&self, steps: usize, hard: bool) -> Result<Stack> {
        let current = self.load_stack()?;
        let mut log = self.open_log(&current.branch)?;
        let restored = log.undo(&self.repo, &current, steps, hard)?;
        self.save_stack(&restored)?;
        info!("Undid {} operations", steps);
        Ok(restored)
    }

    /// Step forward through operations removed by undo
    pub fn redo(&self, steps: usize, hard: bool) -> Result<Stack> {
        let current = self.load_stack()?;
        let mut log = self.open_log(&current.branch)?;
        let restored = log.redo(&self.repo, &current, steps, hard)?;
        self.save_stack(&restored)?;
        info!("Redid {} operations", steps);
        Ok(restored)
    }

    /// Record the resolved index as the patch whose push conflicted
    pub fn resolve(&self) -> Result<Patch> {
        let stack = self.load_stack()?;
        let (resolved, patch) = conflict::resolve(&self.repo, &stack, &self.default_identity()?)?;

        let mut log = self.open_log(&stack.branch)?;
        // undoing a resolve goes back past the conflicted operation
        let prev = log.head().and_then(|head| head.prev);
        self.commit(&mut log, &resolved, "resolve", prev)?;
        Ok(patch)
    }
}
