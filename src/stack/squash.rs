//! Combining several patches into one.
//!
//! Targets are popped, pushed back onto the squash site in the order the
//! caller gave them, and replaced by a single patch whose tree is the tree
//! after the last target push. Patches that had to be popped on the way
//! are then pushed again.

use super::log::SnapshotId;
use super::manager::StackManager;
use super::patch::{Identity, Patch, PatchName, PatchState, CO_AUTHORED_BY};
use super::planner::{self, SquashPlan};
use super::stack::{PendingConflict, Stack};
use super::transaction::StackTransaction;
use crate::errors::{Result, StackError};
use crate::utils::editor::MessageEditor;
use std::fmt::Write;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Where the squashed patch's message comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSource {
    /// Used as given, no editor
    Inline(String),
    /// Read verbatim from a file, no editor
    File(PathBuf),
    /// File contents pre-fill the editor
    Template(PathBuf),
    /// Editor pre-filled with the target messages
    EditorInvocation,
}

#[derive(Debug, Clone, Default)]
pub struct SquashRequest {
    /// Patches to combine, in the order their changes are applied
    pub targets: Vec<String>,
    pub explicit_name: Option<String>,
    pub message_source: Option<MessageSource>,
    pub author_override: Option<Identity>,
}

/// Per-invocation settings the squash needs from its caller
pub struct SquashContext {
    /// Author for multi-author squashes and committer for every new commit
    pub default_identity: Identity,
    pub name_length: usize,
    pub editor: Box<dyn MessageEditor>,
}

/// Who the squashed patch is attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorship {
    pub author: Identity,
    pub co_authors: Vec<Identity>,
}

impl Authorship {
    /// Pick the author from the targets' authors, listed in caller order
    pub fn resolve(
        target_authors: &[Identity],
        author_override: Option<&Identity>,
        default_identity: &Identity,
    ) -> Self {
        if let Some(author) = author_override {
            return Self {
                author: author.clone(),
                co_authors: Vec::new(),
            };
        }

        let mut distinct: Vec<Identity> = Vec::new();
        for author in target_authors {
            if !distinct.contains(author) {
                distinct.push(author.clone());
            }
        }

        if let [only] = distinct.as_slice() {
            return Self {
                author: only.clone(),
                co_authors: Vec::new(),
            };
        }

        Self {
            author: default_identity.clone(),
            co_authors: distinct
                .into_iter()
                .filter(|identity| identity != default_identity)
                .collect(),
        }
    }

    pub fn trailers(&self) -> Vec<String> {
        self.co_authors
            .iter()
            .map(Identity::co_author_trailer)
            .collect()
    }
}

/// Validated request: resolved targets and the optional explicit name
struct Checked {
    targets: Vec<PatchName>,
    name: Option<PatchName>,
}

fn check_request(stack: &Stack, request: &SquashRequest) -> Result<Checked> {
    let name = request
        .explicit_name
        .as_deref()
        .map(PatchName::new)
        .transpose()?;

    let mut targets: Vec<PatchName> = Vec::with_capacity(request.targets.len());
    for raw in &request.targets {
        let patch = stack.get(raw)?;
        if targets.contains(&patch.name) {
            return Err(StackError::general(format!(
                "patch `{}` given more than once",
                patch.name
            )));
        }
        targets.push(patch.name.clone());
    }

    if let Some(name) = &name {
        if !targets.contains(name) {
            if let Some(taken) = stack.collides(name) {
                return Err(StackError::command(format!(
                    "patch name `{taken}` already taken"
                )));
            }
        }
    }

    if targets.len() < 2 {
        return Err(StackError::command("need at least two patches"));
    }

    Ok(Checked { targets, name })
}

const EDIT_GUIDANCE: &str = "\
# Please enter the message for the squashed patch. Lines starting
# with '#' are ignored, and an empty message aborts the squash.
";

/// Editor buffer built from the target messages, in caller order
pub fn message_template(patches: &[&Patch], trailers: &[String]) -> String {
    let mut buffer = String::new();
    for (i, patch) in patches.iter().enumerate() {
        let _ = write!(
            buffer,
            "# Commit message from patch #{}: {}\n{}\n\n",
            i + 1,
            patch.name,
            patch.message.trim_end()
        );
    }
    if !trailers.is_empty() {
        buffer.push_str(&trailers.join("\n"));
        buffer.push_str("\n\n");
    }
    buffer.push_str(EDIT_GUIDANCE);
    buffer
}

/// Drop `#` lines and surrounding blank lines
pub fn strip_comments(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim_end)
        .collect();
    let body = kept.join("\n");
    let body = body.trim_matches('\n');
    if body.trim().is_empty() {
        String::new()
    } else {
        format!("{body}\n")
    }
}

/// Append trailers the message does not carry yet
pub fn append_missing_trailers(message: &str, trailers: &[String]) -> String {
    let body = message.trim_end();
    let missing: Vec<&String> = trailers
        .iter()
        .filter(|t| !body.lines().any(|line| line.trim() == t.as_str()))
        .collect();
    if missing.is_empty() {
        return if body.is_empty() {
            String::new()
        } else {
            format!("{body}\n")
        };
    }

    let ends_in_trailer = body
        .lines()
        .last()
        .is_some_and(|line| line.starts_with(CO_AUTHORED_BY));
    let separator = if body.is_empty() || ends_in_trailer {
        ""
    } else {
        "\n"
    };
    let mut out = format!("{body}\n{separator}");
    for trailer in missing {
        out.push_str(trailer);
        out.push('\n');
    }
    out.trim_start_matches('\n').to_string()
}

/// True when nothing but trailers and whitespace is left
fn is_empty_description(message: &str) -> bool {
    message
        .lines()
        .filter(|line| !line.starts_with(CO_AUTHORED_BY))
        .all(|line| line.trim().is_empty())
}

fn read_message_file(path: &PathBuf) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        StackError::command(format!("could not read message file {}: {e}", path.display()))
    })
}

/// Produce the squashed patch's message; may run the editor
fn synthesize_message(
    source: Option<&MessageSource>,
    patches: &[&Patch],
    trailers: &[String],
    editor: &dyn MessageEditor,
) -> Result<String> {
    match source {
        Some(MessageSource::Inline(message)) => Ok(append_missing_trailers(message, trailers)),
        Some(MessageSource::File(path)) => {
            Ok(append_missing_trailers(&read_message_file(path)?, trailers))
        }
        Some(MessageSource::Template(path)) => {
            let template = read_message_file(path)?;
            let buffer = format!(
                "{}\n{EDIT_GUIDANCE}",
                append_missing_trailers(&template, trailers)
            );
            Ok(strip_comments(&editor.edit(&buffer)?))
        }
        Some(MessageSource::EditorInvocation) | None => {
            let buffer = message_template(patches, trailers);
            Ok(strip_comments(&editor.edit(&buffer)?))
        }
    }
}

/// Build the editor buffer a squash would show, without changing anything
pub fn save_template(
    manager: &StackManager,
    request: &SquashRequest,
    context: &SquashContext,
) -> Result<String> {
    let stack = manager.load_stack()?;
    super::conflict::guard(manager.repository(), &stack)?;
    let checked = check_request(&stack, request)?;

    let patches = checked
        .targets
        .iter()
        .map(|name| stack.get(name.as_str()))
        .collect::<Result<Vec<_>>>()?;
    let authors: Vec<Identity> = patches.iter().map(|p| p.author.clone()).collect();
    let authorship = Authorship::resolve(
        &authors,
        request.author_override.as_ref(),
        &context.default_identity,
    );

    Ok(message_template(&patches, &authorship.trailers()))
}

/// Squash the requested patches into one
pub fn squash(
    manager: &StackManager,
    request: &SquashRequest,
    context: &SquashContext,
) -> Result<Patch> {
    let repo = manager.repository();
    let stack = manager.load_stack()?;

    super::conflict::guard(repo, &stack)?;
    let checked = check_request(&stack, request)?;
    let plan = planner::plan_squash(&stack, &checked.targets)?;
    debug!("Squash plan: {:?}", plan);

    let mut log = manager.open_log(&stack.branch)?;
    let before = log.capture(&stack, "squash")?;

    let mut trans = StackTransaction::begin(repo, stack.clone(), context.default_identity.clone())?;
    trans.pop_from(plan.site_index)?;
    let site_base = trans.head_commit().to_string();

    if let Some(pending) = trans.push_series(&plan.push_targets)? {
        let stack = trans.finish()?;
        return Err(record_conflict(
            manager,
            &mut log,
            &stack,
            before,
            pending,
            "conflicts while squashing",
        ));
    }
    let tree = trans.head_tree()?;

    let originals = checked
        .targets
        .iter()
        .map(|name| stack.get(name.as_str()))
        .collect::<Result<Vec<_>>>()?;
    let authors: Vec<Identity> = originals.iter().map(|p| p.author.clone()).collect();
    let authorship = Authorship::resolve(
        &authors,
        request.author_override.as_ref(),
        &context.default_identity,
    );

    let message = match synthesize_message(
        request.message_source.as_ref(),
        &originals,
        &authorship.trailers(),
        context.editor.as_ref(),
    ) {
        Ok(message) if !is_empty_description(&message) => message,
        Ok(_) => {
            trans.roll_back()?;
            return Err(StackError::command("aborting due to empty patch description"));
        }
        Err(e) => {
            trans.roll_back()?;
            return Err(e);
        }
    };

    let name = match checked.name {
        Some(name) => name,
        None => PatchName::slug(&message, context.name_length).uniquify(|candidate| {
            stack.contains(candidate.as_str()) && !checked.targets.contains(candidate)
        }),
    };

    let commit_id = repo.create_commit(
        tree,
        &site_base,
        &authorship.author,
        &context.default_identity,
        &message,
    )?;
    trans.remove(&checked.targets)?;

    let squashed = Patch::new(
        name.clone(),
        commit_id,
        authorship.author,
        message,
        if plan.push_squashed {
            PatchState::Applied
        } else {
            PatchState::Unapplied
        },
    );
    if plan.push_squashed {
        trans.append_applied(squashed)?;
    } else {
        trans.insert_unapplied(0, squashed)?;
    }

    if let Some(pending) = trans.push_series(&plan.displaced)? {
        let stack = trans.finish()?;
        let message = format!("conflicts while reapplying `{}`", pending.patch);
        return Err(record_conflict(
            manager, &mut log, &stack, before, pending, &message,
        ));
    }

    let stack = trans.finish()?;
    manager.commit(&mut log, &stack, "squash", Some(before))?;
    log_result(&plan, &name);

    stack.get(name.as_str()).cloned()
}

fn log_result(plan: &SquashPlan, name: &PatchName) {
    if plan.push_squashed {
        info!(
            "Squashed {} patches into `{}` ({} reapplied)",
            plan.push_targets.len(),
            name,
            plan.displaced.len()
        );
    } else {
        info!(
            "Squashed {} unapplied patches into `{}`",
            plan.push_targets.len(),
            name
        );
    }
}

/// Persist a conflicted stack and turn it into the error the caller reports
fn record_conflict(
    manager: &StackManager,
    log: &mut super::log::SnapshotLog,
    stack: &Stack,
    before: SnapshotId,
    pending: PendingConflict,
    message: &str,
) -> StackError {
    if let Err(e) = manager.commit(log, stack, "squash (conflict)", Some(before)) {
        return e;
    }
    StackError::conflict(message.to_string(), pending.patch.to_string(), pending.paths)
}
