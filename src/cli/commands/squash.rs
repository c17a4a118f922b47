use super::open_manager;
use crate::cli::output::Output;
use crate::cli::resolve::resolve_all;
use crate::errors::{Result, StackError};
use crate::stack::squash::save_template;
use crate::stack::{Identity, MessageSource, SquashRequest, StackStatus};
use crate::utils::atomic_file;
use crate::utils::editor::ExternalEditor;
use std::path::{Path, PathBuf};

/// Command-line arguments of `pst squash`
#[derive(Debug, Default)]
pub struct SquashArgs {
    pub patches: Vec<String>,
    pub name: Option<String>,
    pub message: Option<String>,
    pub file: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub save_template: Option<String>,
    pub author: Option<String>,
}

impl SquashArgs {
    /// Inline message, then message file, then template, then the editor
    fn message_source(&self) -> MessageSource {
        if let Some(message) = &self.message {
            MessageSource::Inline(message.clone())
        } else if let Some(file) = &self.file {
            MessageSource::File(file.clone())
        } else if let Some(template) = &self.template {
            MessageSource::Template(template.clone())
        } else {
            MessageSource::EditorInvocation
        }
    }
}

/// Squash two or more patches into one
pub fn run(args: SquashArgs) -> Result<()> {
    let manager = open_manager()?;
    let repo = manager.repository();

    let author_override = args
        .author
        .as_deref()
        .map(str::parse::<Identity>)
        .transpose()?;

    let stack = manager.load_stack()?;
    let known: Vec<String> = stack.all_names().iter().map(|n| n.to_string()).collect();
    let targets = resolve_all(&args.patches, &known)?;

    let request = SquashRequest {
        targets,
        explicit_name: args.name.clone(),
        message_source: Some(args.message_source()),
        author_override,
    };

    let editor = ExternalEditor::for_git_dir(
        repo.git_dir(),
        manager.settings().editor.as_deref(),
        repo.config_string("core.editor").as_deref(),
    );
    tracing::debug!("Message editor: {}", editor.command());
    let context = manager.squash_context(Box::new(editor))?;

    if let Some(destination) = &args.save_template {
        let template = save_template(&manager, &request, &context)?;
        return write_template(destination, &template);
    }

    match manager.squash(&request, &context) {
        Ok(patch) => {
            Output::success(format!("Squashed into `{}`", patch.name));
            Output::sub_item(format!("{} {}", patch.short_hash(), patch.subject()));
            if !patch.is_applied() {
                Output::sub_item("Patch is unapplied; push it with `pst push`");
            }
            Ok(())
        }
        Err(e @ StackError::Conflict { .. }) => {
            report_conflict(&manager);
            Err(e)
        }
        Err(e) => Err(e),
    }
}

fn write_template(destination: &str, template: &str) -> Result<()> {
    if destination == "-" {
        print!("{template}");
        return Ok(());
    }
    let path = Path::new(destination);
    atomic_file::write_string(path, template)?;
    Output::success(format!("Message template written to {}", path.display()));
    Ok(())
}

fn report_conflict(manager: &crate::stack::StackManager) {
    let Ok(stack) = manager.load_stack() else {
        return;
    };
    if stack.status != StackStatus::Conflicted {
        return;
    }
    if let Some(pending) = &stack.conflict {
        Output::warning(format!("Conflicts in `{}`:", pending.patch));
        for path in &pending.paths {
            Output::sub_item(path);
        }
    }
    Output::next_steps(&[
        "Fix the files, `git add` them, then run `pst resolve`",
        "Or restore the stack with `pst undo --hard`",
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_source_precedence() {
        let args = SquashArgs {
            message: Some("inline".to_string()),
            file: Some(PathBuf::from("msg.txt")),
            template: Some(PathBuf::from("tmpl.txt")),
            ..Default::default()
        };
        assert_eq!(
            args.message_source(),
            MessageSource::Inline("inline".to_string())
        );

        let args = SquashArgs {
            file: Some(PathBuf::from("msg.txt")),
            template: Some(PathBuf::from("tmpl.txt")),
            ..Default::default()
        };
        assert_eq!(
            args.message_source(),
            MessageSource::File(PathBuf::from("msg.txt"))
        );

        let args = SquashArgs {
            template: Some(PathBuf::from("tmpl.txt")),
            ..Default::default()
        };
        assert_eq!(
            args.message_source(),
            MessageSource::Template(PathBuf::from("tmpl.txt"))
        );

        assert_eq!(
            SquashArgs::default().message_source(),
            MessageSource::EditorInvocation
        );
    }
}
