//! Pop/push planning for stack rewrites.
//!
//! Planning is pure: it only looks at stack order and never touches the
//! object store. The transaction executes the plan.

use super::patch::PatchName;
use super::stack::Stack;
use crate::errors::{Result, StackError};
use std::collections::HashSet;

/// How to bring squash targets together and what to reapply afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquashPlan {
    /// Applied slot the squashed patch takes. Equal to the number of applied
    /// patches when no target is applied.
    pub site_index: usize,
    /// Applied patches to pop, bottom first
    pub pop: Vec<PatchName>,
    /// Popped patches that are not targets, in their original order
    pub displaced: Vec<PatchName>,
    /// Targets in the order their diffs are combined
    pub push_targets: Vec<PatchName>,
    /// Whether the squashed patch ends up applied
    pub push_squashed: bool,
}

/// Which patches a pop removes and which it puts back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopPlan {
    pub site_index: usize,
    pub pop: Vec<PatchName>,
    /// Popped patches that were not asked for, pushed back in order
    pub repush: Vec<PatchName>,
}

fn check_distinct(stack: &Stack, names: &[PatchName]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        stack.get(name.as_str())?;
        if !seen.insert(name) {
            return Err(StackError::general(format!(
                "patch `{name}` given more than once"
            )));
        }
    }
    Ok(())
}

fn popped_from(stack: &Stack, site_index: usize) -> Vec<PatchName> {
    stack.applied[site_index..]
        .iter()
        .map(|p| p.name.clone())
        .collect()
}

/// Plan a squash of `targets`, combined in the given order
pub fn plan_squash(stack: &Stack, targets: &[PatchName]) -> Result<SquashPlan> {
    check_distinct(stack, targets)?;

    let lowest_applied = targets
        .iter()
        .filter_map(|name| stack.applied_index(name.as_str()))
        .min();

    let Some(site_index) = lowest_applied else {
        return Ok(SquashPlan {
            site_index: stack.applied.len(),
            pop: Vec::new(),
            displaced: Vec::new(),
            push_targets: targets.to_vec(),
            push_squashed: false,
        });
    };

    let pop = popped_from(stack, site_index);
    let displaced = pop
        .iter()
        .filter(|name| !targets.contains(name))
        .cloned()
        .collect();

    Ok(SquashPlan {
        site_index,
        pop,
        displaced,
        push_targets: targets.to_vec(),
        push_squashed: true,
    })
}

/// Plan popping `names`; an empty list pops the top patch
pub fn plan_pop(stack: &Stack, names: &[PatchName]) -> Result<PopPlan> {
    check_distinct(stack, names)?;

    if names.is_empty() {
        let top = stack
            .top()
            .ok_or_else(|| StackError::command("no patches applied"))?;
        return Ok(PopPlan {
            site_index: stack.applied.len() - 1,
            pop: vec![top.name.clone()],
            repush: Vec::new(),
        });
    }

    let mut site_index = stack.applied.len();
    for name in names {
        let index = stack
            .applied_index(name.as_str())
            .ok_or_else(|| StackError::command(format!("patch `{name}` is not applied")))?;
        site_index = site_index.min(index);
    }

    let pop = popped_from(stack, site_index);
    let repush = pop
        .iter()
        .filter(|name| !names.contains(name))
        .cloned()
        .collect();

    Ok(PopPlan {
        site_index,
        pop,
        repush,
    })
}

/// Plan pushing `names` in order; an empty list pushes the next unapplied patch
pub fn plan_push(stack: &Stack, names: &[PatchName]) -> Result<Vec<PatchName>> {
    check_distinct(stack, names)?;

    if names.is_empty() {
        return stack
            .unapplied
            .first()
            .map(|p| vec![p.name.clone()])
            .ok_or_else(|| StackError::command("no patches to push"));
    }

    for name in names {
        if stack.is_applied(name.as_str()) {
            return Err(StackError::command(format!(
                "patch `{name}` is already applied"
            )));
        }
    }
    Ok(names.to_vec())
}
