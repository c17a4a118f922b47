use super::{open_manager, resolve_names};
use crate::cli::output::Output;
use crate::errors::Result;

/// Push named patches, the next one, or all of them
pub fn push(names: Vec<String>, all: bool) -> Result<()> {
    let manager = open_manager()?;
    let names = resolve_names(&manager, &names)?;
    let pushed = manager.push(&names, all)?;

    for name in &pushed {
        Output::success(format!("Pushed `{name}`"));
    }
    report_top(&manager)
}

/// Pop named patches, the top one, or all of them
pub fn pop(names: Vec<String>, all: bool) -> Result<()> {
    let manager = open_manager()?;
    let names = resolve_names(&manager, &names)?;
    let popped = manager.pop(&names, all)?;

    for name in &popped {
        Output::success(format!("Popped `{name}`"));
    }
    report_top(&manager)
}

fn report_top(manager: &crate::stack::StackManager) -> Result<()> {
    let stack = manager.load_stack()?;
    match stack.top() {
        Some(top) => Output::sub_item(format!("Now at `{}`", top.name)),
        None => Output::sub_item("No patches applied"),
    }
    Ok(())
}
