use super::stack::{Stack, StackStatus};
use super::transaction;
use crate::errors::{Result, StackError};
use crate::git::GitRepository;
use crate::utils::atomic_file;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Sequence number of a snapshot, increasing by one per entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub u64);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One immutable whole-stack state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub operation: String,
    pub created_at: DateTime<Utc>,
    pub state: Stack,
    /// Entry an undo from here goes back to
    pub prev: Option<SnapshotId>,
    /// Entry a redo from here goes forward to
    pub undone: Option<SnapshotId>,
}

/// Append-only log of stack states stored as JSON lines
pub struct SnapshotLog {
    path: PathBuf,
    entries: Vec<Snapshot>,
}

impl SnapshotLog {
    /// Load the log at `path`; a missing file is an empty log
    pub fn open(path: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        if path.exists() {
            let content = fs::read_to_string(path)?;
            for (number, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let snapshot: Snapshot = serde_json::from_str(line).map_err(|e| {
                    StackError::config(format!(
                        "corrupt snapshot log {} at line {}: {e}",
                        path.display(),
                        number + 1
                    ))
                })?;
                entries.push(snapshot);
            }
        }
        debug!("Loaded {} snapshots from {}", entries.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    pub fn head(&self) -> Option<&Snapshot> {
        self.entries.last()
    }

    pub fn get(&self, id: SnapshotId) -> Result<&Snapshot> {
        // ids are dense, but do not rely on it for a hand-edited log
        self.entries
            .iter()
            .rev()
            .find(|s| s.id == id)
            .ok_or_else(|| StackError::command(format!("snapshot {id} does not exist")))
    }

    /// Record `state` unless the newest entry already holds it
    pub fn capture(&mut self, state: &Stack, operation: &str) -> Result<SnapshotId> {
        if let Some(head) = self.head() {
            if head.state.same_state(state) {
                return Ok(head.id);
            }
        }
        let prev = self.head().map(|s| s.id);
        self.append(state, operation, prev)
    }

    /// Record the state a committed operation produced
    pub fn append(
        &mut self,
        state: &Stack,
        operation: &str,
        prev: Option<SnapshotId>,
    ) -> Result<SnapshotId> {
        self.push_entry(state.clone(), operation, prev, None)
    }

    fn push_entry(
        &mut self,
        state: Stack,
        operation: &str,
        prev: Option<SnapshotId>,
        undone: Option<SnapshotId>,
    ) -> Result<SnapshotId> {
        let id = SnapshotId(self.head().map_or(1, |s| s.id.0 + 1));
        let snapshot = Snapshot {
            id,
            operation: operation.to_string(),
            created_at: Utc::now(),
            state,
            prev,
            undone,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_file::append_line(&self.path, &serde_json::to_string(&snapshot)?)?;
        debug!("Snapshot {} recorded for {}", id, operation);
        self.entries.push(snapshot);
        Ok(id)
    }

    /// Materialize a snapshot's state; refuses to touch a dirty worktree
    pub fn restore(&self, id: SnapshotId, repo: &GitRepository) -> Result<Stack> {
        if repo.has_conflicts()? || repo.is_dirty()? {
            return Err(StackError::DirtyWorkingTree);
        }
        let state = self.get(id)?.state.clone();
        transaction::materialize(repo, &state, false)?;
        info!("Restored snapshot {}", id);
        Ok(state)
    }

    /// Materialize a snapshot's state, discarding conflicts and local changes
    pub fn restore_hard(&self, id: SnapshotId, repo: &GitRepository) -> Result<Stack> {
        let state = self.get(id)?.state.clone();
        repo.reset_hard()?;
        transaction::materialize(repo, &state, true)?;
        info!("Restored snapshot {} (hard)", id);
        Ok(state)
    }

    fn restore_with(&self, id: SnapshotId, repo: &GitRepository, hard: bool) -> Result<Stack> {
        if hard {
            self.restore_hard(id, repo)
        } else {
            self.restore(id, repo)
        }
    }

    /// Step back `steps` operations.
    ///
    /// Each step appends an entry so the undo itself can be redone.
    pub fn undo(
        &mut self,
        repo: &GitRepository,
        current: &Stack,
        steps: usize,
        hard: bool,
    ) -> Result<Stack> {
        if !hard && current.status == StackStatus::Conflicted {
            return Err(StackError::DirtyWorkingTree);
        }
        let mut head = self
            .head()
            .ok_or_else(|| StackError::command("nothing to undo"))?;
        let mut targets = Vec::new();
        for _ in 0..steps {
            let target = head
                .prev
                .ok_or_else(|| StackError::command("nothing to undo"))
                .and_then(|prev| self.get(prev))?;
            targets.push(target.id);
            head = target;
        }
        let Some(&last) = targets.last() else {
            return Err(StackError::command("number of steps must be positive"));
        };

        let restored = self.restore_with(last, repo, hard)?;
        for target in targets {
            let undone = self.head().map(|s| s.id);
            let snapshot = self.get(target)?.clone();
            self.push_entry(snapshot.state, "undo", snapshot.prev, undone)?;
        }
        Ok(restored)
    }

    /// Re-apply operations removed by `undo`
    pub fn redo(
        &mut self,
        repo: &GitRepository,
        current: &Stack,
        steps: usize,
        hard: bool,
    ) -> Result<Stack> {
        if !hard && current.status == StackStatus::Conflicted {
            return Err(StackError::DirtyWorkingTree);
        }
        let mut undone = self.head().and_then(|s| s.undone);
        let mut targets = Vec::new();
        for _ in 0..steps {
            let target = undone
                .ok_or_else(|| StackError::command("nothing to redo"))
                .and_then(|id| self.get(id))?;
            targets.push(target.id);
            undone = target.undone;
        }
        let Some(&last) = targets.last() else {
            return Err(StackError::command("number of steps must be positive"));
        };

        let restored = self.restore_with(last, repo, hard)?;
        for target in targets {
            let snapshot = self.get(target)?.clone();
            self.push_entry(snapshot.state, "redo", snapshot.prev, snapshot.undone)?;
        }
        Ok(restored)
    }
}
