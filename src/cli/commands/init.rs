use super::open_manager;
use crate::cli::output::Output;
use crate::errors::Result;

/// Start a patch stack on the checked-out branch
pub fn run(adopt: usize) -> Result<()> {
    tracing::info!("Initializing patch stack...");
    let manager = open_manager()?;
    let stack = manager.initialize(adopt)?;

    Output::success(format!("Patch stack initialized on `{}`", stack.branch));
    if stack.is_empty() {
        Output::sub_item(format!("Base: {}", &stack.base[..stack.base.len().min(8)]));
    } else {
        Output::sub_item(format!("Adopted {} commits as patches:", stack.len()));
        let top = stack.top().map(|p| p.name.clone());
        for patch in stack.applied() {
            Output::patch_line(patch, Some(&patch.name) == top.as_ref());
        }
    }

    Output::next_steps(&[
        "Review the stack with `pst status`",
        "Reorder with `pst pop` / `pst push`",
        "Combine patches with `pst squash <patch>...`",
    ]);
    Ok(())
}
