use super::open_manager;
use crate::cli::output::Output;
use crate::errors::Result;

/// Print the snapshot log of the current branch, newest first
pub fn run(limit: Option<usize>) -> Result<()> {
    let manager = open_manager()?;
    let branch = manager.repository().get_current_branch()?;
    let log = manager.open_log(&branch)?;

    let entries = log.entries();
    if entries.is_empty() {
        Output::info(format!("No snapshots for `{branch}`"));
        return Ok(());
    }

    let limit = limit.unwrap_or(entries.len());
    for snapshot in entries.iter().rev().take(limit) {
        Output::snapshot_line(snapshot);
    }
    Ok(())
}
