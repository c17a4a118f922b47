use crate::stack::{Patch, Snapshot};
use console::style;
use std::fmt::Display;

/// Consistent formatting for everything pst prints to stdout
pub struct Output;

impl Output {
    /// Print a success message with checkmark
    pub fn success<T: Display>(message: T) {
        println!("{} {}", style("✓").green(), message);
    }

    /// Print a warning message
    pub fn warning<T: Display>(message: T) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    /// Print an info message
    pub fn info<T: Display>(message: T) {
        println!("{} {}", style("ℹ").cyan(), message);
    }

    /// Print a sub-item with arrow prefix
    pub fn sub_item<T: Display>(message: T) {
        println!("  {} {}", style("→").dim(), message);
    }

    /// Print a bullet point
    pub fn bullet<T: Display>(message: T) {
        println!("  {} {}", style("•").dim(), message);
    }

    /// Print a section header
    pub fn section<T: Display>(title: T) {
        println!("\n{}", style(title).bold().underlined());
    }

    /// Print a tip/suggestion
    pub fn tip<T: Display>(message: T) {
        println!("{} {}", style("TIP:").cyan(), style(message).dim());
    }

    /// One line per patch: marker, name, short hash, subject
    pub fn patch_line(patch: &Patch, is_top: bool) {
        let marker = if is_top {
            style(">").green().bold()
        } else if patch.is_applied() {
            style("+").green()
        } else {
            style("-").dim()
        };
        let name = if patch.is_applied() {
            style(patch.name.as_str()).bold()
        } else {
            style(patch.name.as_str()).dim()
        };
        println!(
            "{} {} {} {}",
            marker,
            name,
            style(patch.short_hash()).yellow(),
            patch.subject()
        );
    }

    /// One line per snapshot log entry
    pub fn snapshot_line(snapshot: &Snapshot) {
        let prev = snapshot
            .prev
            .map(|id| format!(" (prev {id})"))
            .unwrap_or_default();
        println!(
            "{} {} {}{} {}",
            style(format!("#{}", snapshot.id)).yellow(),
            style(snapshot.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
            style(&snapshot.operation).bold(),
            style(prev).dim(),
            style(format!("[{} applied]", snapshot.state.applied.len())).dim()
        );
    }

    /// Print next steps guidance
    pub fn next_steps(steps: &[&str]) {
        println!();
        Self::tip("Next steps:");
        for step in steps {
            Self::bullet(step);
        }
    }
}
