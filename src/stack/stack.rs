use super::patch::{Patch, PatchName, PatchState};
use crate::errors::{Result, StackError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;

/// Persisted status of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackStatus {
    /// Applied patches match the branch and the index is clean
    Clean,
    /// A push stopped on a conflict; needs `resolve` or `undo --hard`
    Conflicted,
}

/// The patch whose push failed, recorded while the stack is conflicted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConflict {
    pub patch: PatchName,
    pub paths: Vec<String>,
}

/// An ordered sequence of patches on one branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    /// Branch this stack lives on
    pub branch: String,
    /// Commit the first applied patch is based on
    pub base: String,
    /// Applied patches, bottom first
    pub applied: Vec<Patch>,
    /// Unapplied patches, next-to-push first
    pub unapplied: Vec<Patch>,
    pub status: StackStatus,
    pub conflict: Option<PendingConflict>,
    pub updated_at: DateTime<Utc>,
}

impl Stack {
    /// Create a new empty stack
    pub fn new(branch: String, base: String) -> Self {
        Self {
            branch,
            base,
            applied: Vec::new(),
            unapplied: Vec::new(),
            status: StackStatus::Clean,
            conflict: None,
            updated_at: Utc::now(),
        }
    }

    /// Look up a patch by name in either partition
    pub fn get(&self, name: &str) -> Result<&Patch> {
        self.iter()
            .find(|p| p.name == name)
            .ok_or_else(|| StackError::NotFound(name.to_string()))
    }

    /// Look up a patch by its commit hash
    pub fn find_by_commit(&self, commit_id: &str) -> Option<&Patch> {
        self.iter().find(|p| p.commit_id == commit_id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.iter().any(|p| p.name == name)
    }

    /// Name of an existing patch equal to `name`, if any
    pub fn collides(&self, name: &PatchName) -> Option<&PatchName> {
        self.iter().map(|p| &p.name).find(|n| *n == name)
    }

    pub fn applied(&self) -> &[Patch] {
        &self.applied
    }

    pub fn unapplied(&self) -> &[Patch] {
        &self.unapplied
    }

    /// All patches in stack order, applied first
    pub fn iter(&self) -> impl Iterator<Item = &Patch> {
        self.applied.iter().chain(self.unapplied.iter())
    }

    pub fn all_names(&self) -> Vec<PatchName> {
        self.iter().map(|p| p.name.clone()).collect()
    }

    /// Topmost applied patch
    pub fn top(&self) -> Option<&Patch> {
        self.applied.last()
    }

    /// Commit the branch head should point at
    pub fn head_commit(&self) -> &str {
        self.top().map(|p| p.commit_id.as_str()).unwrap_or(&self.base)
    }

    /// Position of an applied patch, bottom = 0
    pub fn applied_index(&self, name: &str) -> Option<usize> {
        self.applied.iter().position(|p| p.name == name)
    }

    pub fn unapplied_index(&self, name: &str) -> Option<usize> {
        self.unapplied.iter().position(|p| p.name == name)
    }

    pub fn is_applied(&self, name: &str) -> bool {
        self.applied_index(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.unapplied.is_empty()
    }

    pub fn len(&self) -> usize {
        self.applied.len() + self.unapplied.len()
    }

    /// Replace a contiguous range of one partition with `patches`.
    ///
    /// The replacement patches take the state of the partition they land in.
    pub fn replace_range(
        &mut self,
        state: PatchState,
        range: Range<usize>,
        patches: Vec<Patch>,
    ) -> Result<Vec<Patch>> {
        let mut candidate = self.clone();
        let partition = match state {
            PatchState::Applied => &mut candidate.applied,
            PatchState::Unapplied => &mut candidate.unapplied,
        };
        if range.start > range.end || range.end > partition.len() {
            return Err(StackError::command(format!(
                "range {}..{} out of bounds for {} {:?} patches",
                range.start,
                range.end,
                partition.len(),
                state
            )));
        }
        let incoming = patches.into_iter().map(|mut p| {
            p.state = state;
            p
        });
        let removed: Vec<Patch> = partition.splice(range, incoming).collect();
        candidate.validate().map_err(StackError::command)?;
        candidate.updated_at = Utc::now();
        *self = candidate;
        Ok(removed)
    }

    /// Equal in everything but the timestamp
    pub fn same_state(&self, other: &Stack) -> bool {
        self.branch == other.branch
            && self.base == other.base
            && self.applied == other.applied
            && self.unapplied == other.unapplied
            && self.status == other.status
            && self.conflict == other.conflict
    }

    pub fn set_status(&mut self, status: StackStatus, conflict: Option<PendingConflict>) {
        self.status = status;
        self.conflict = conflict;
        self.updated_at = Utc::now();
    }

    /// Check name uniqueness and partition states
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for patch in self.iter() {
            if !seen.insert(patch.name.as_str()) {
                return Err(format!("patch name `{}` appears twice", patch.name));
            }
        }
        if let Some(p) = self.applied.iter().find(|p| p.state != PatchState::Applied) {
            return Err(format!("patch `{}` is in the applied list but marked unapplied", p.name));
        }
        if let Some(p) = self.unapplied.iter().find(|p| p.state != PatchState::Unapplied) {
            return Err(format!("patch `{}` is in the unapplied list but marked applied", p.name));
        }
        if self.status == StackStatus::Conflicted && self.conflict.is_none() {
            return Err("conflicted stack without a pending patch".to_string());
        }
        Ok(())
    }
}
