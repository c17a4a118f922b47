use super::open_manager;
use crate::cli::output::Output;
use crate::errors::Result;

/// Record the resolved index as the patch whose push stopped
pub fn run() -> Result<()> {
    let manager = open_manager()?;
    let patch = manager.resolve()?;

    Output::success(format!("Resolved `{}`", patch.name));
    Output::sub_item(format!("{} {}", patch.short_hash(), patch.subject()));

    let stack = manager.load_stack()?;
    if !stack.unapplied().is_empty() {
        Output::tip(format!(
            "{} patches are still unapplied; `pst push` continues",
            stack.unapplied().len()
        ));
    }
    Ok(())
}
