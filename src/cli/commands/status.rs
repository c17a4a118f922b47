use super::open_manager;
use crate::cli::output::Output;
use crate::errors::Result;
use crate::stack::{Stack, StackStatus};

/// Show the stack of the checked-out branch
pub fn run() -> Result<()> {
    let manager = open_manager()?;
    let stack = manager.load_stack()?;
    let repo = manager.repository();

    Output::section(format!("Stack on `{}`", stack.branch));
    print_patches(&stack);

    if stack.status == StackStatus::Conflicted {
        println!();
        if let Some(pending) = &stack.conflict {
            Output::warning(format!("Push of `{}` stopped on conflicts:", pending.patch));
            for path in &pending.paths {
                Output::sub_item(path);
            }
        }
        Output::next_steps(&[
            "Fix the files, `git add` them, then run `pst resolve`",
            "Or throw the attempt away with `pst undo --hard`",
        ]);
        return Ok(());
    }

    if repo.is_dirty()? {
        println!();
        Output::warning("Working tree has local changes");
    }
    if repo.get_head_commit_hash()? != stack.head_commit() {
        Output::warning("HEAD and top are not the same");
    }
    Ok(())
}

fn print_patches(stack: &Stack) {
    if stack.is_empty() {
        Output::info("No patches");
        return;
    }

    let top = stack.top().map(|p| &p.name);
    for patch in stack.applied() {
        Output::patch_line(patch, Some(&patch.name) == top);
    }
    for patch in stack.unapplied() {
        Output::patch_line(patch, false);
    }
    println!();
    Output::info(format!(
        "{} applied, {} unapplied",
        stack.applied().len(),
        stack.unapplied().len()
    ));
}
