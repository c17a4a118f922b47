//! Patch-name prefix matching for command-line arguments.

use crate::errors::{Result, StackError};

/// Outcome of matching a user-typed name against known names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Unique(String),
    Ambiguous(Vec<String>),
    NotFound,
}

/// Match `prefix` against `known`: an exact match wins, otherwise a single
/// name starting with `prefix`.
pub fn resolve<S: AsRef<str>>(prefix: &str, known: &[S]) -> Resolution {
    if known.iter().any(|name| name.as_ref() == prefix) {
        return Resolution::Unique(prefix.to_string());
    }
    if prefix.is_empty() {
        return Resolution::NotFound;
    }

    let mut candidates: Vec<String> = known
        .iter()
        .filter_map(|name| {
            let name: &str = name.as_ref();
            name.starts_with(prefix).then(|| name.to_string())
        })
        .collect();

    match candidates.len() {
        0 => Resolution::NotFound,
        1 => Resolution::Unique(candidates.remove(0)),
        _ => {
            candidates.sort();
            Resolution::Ambiguous(candidates)
        }
    }
}

/// Resolve every argument; unknown names pass through unchanged so the
/// stack reports them, ambiguous ones are rejected here
pub fn resolve_all<S: AsRef<str>>(args: &[String], known: &[S]) -> Result<Vec<String>> {
    args.iter()
        .map(|arg| match resolve(arg, known) {
            Resolution::Unique(name) => Ok(name),
            Resolution::NotFound => Ok(arg.clone()),
            Resolution::Ambiguous(candidates) => Err(StackError::general(format!(
                "ambiguous patch name `{arg}`: could be {}",
                candidates.join(", ")
            ))),
        })
        .collect()
}
