use super::open_manager;
use crate::cli::output::Output;
use crate::errors::Result;
use crate::stack::Stack;

/// Step back `steps` operations in the snapshot log
pub fn undo(steps: usize, hard: bool) -> Result<()> {
    let manager = open_manager()?;
    let stack = manager.undo(steps, hard)?;
    Output::success(format!("Undid {} {}", steps, plural(steps)));
    report(&stack);
    Ok(())
}

/// Step forward `steps` operations removed by undo
pub fn redo(steps: usize, hard: bool) -> Result<()> {
    let manager = open_manager()?;
    let stack = manager.redo(steps, hard)?;
    Output::success(format!("Redid {} {}", steps, plural(steps)));
    report(&stack);
    Ok(())
}

fn plural(steps: usize) -> &'static str {
    if steps == 1 {
        "operation"
    } else {
        "operations"
    }
}

fn report(stack: &Stack) {
    match stack.top() {
        Some(top) => Output::sub_item(format!(
            "Now at `{}` ({} applied, {} unapplied)",
            top.name,
            stack.applied().len(),
            stack.unapplied().len()
        )),
        None => Output::sub_item(format!(
            "No patches applied ({} unapplied)",
            stack.unapplied().len()
        )),
    }
}
