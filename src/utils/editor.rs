use crate::errors::{Result, StackError};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Name of the scratch file handed to the editor, relative to the git dir
pub const EDIT_FILE_NAME: &str = "PATCH_EDITMSG";

/// Something that lets the user edit a message buffer
pub trait MessageEditor {
    /// Return the edited buffer; an `Err` aborts the calling operation
    fn edit(&self, buffer: &str) -> Result<String>;
}

impl<F> MessageEditor for F
where
    F: Fn(&str) -> Result<String>,
{
    fn edit(&self, buffer: &str) -> Result<String> {
        self(buffer)
    }
}

/// Runs the user's editor on a file and reads it back
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    command: String,
    path: PathBuf,
}

impl ExternalEditor {
    pub fn new<S: Into<String>>(command: S, path: PathBuf) -> Self {
        Self {
            command: command.into(),
            path,
        }
    }

    /// Editor from the environment, editing `<git_dir>/PATCH_EDITMSG`
    pub fn for_git_dir(
        git_dir: &Path,
        configured: Option<&str>,
        core_editor: Option<&str>,
    ) -> Self {
        Self::new(
            default_editor(configured, core_editor),
            git_dir.join(EDIT_FILE_NAME),
        )
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(not(windows))]
    fn shell_command(&self) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("{} \"$@\"", self.command))
            .arg(&self.command)
            .arg(&self.path);
        cmd
    }

    #[cfg(windows)]
    fn shell_command(&self) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(&self.command).arg(&self.path);
        cmd
    }
}

impl MessageEditor for ExternalEditor {
    fn edit(&self, buffer: &str) -> Result<String> {
        fs::write(&self.path, buffer)?;
        debug!("Invoking editor `{}` on {}", self.command, self.path.display());

        let status = self.shell_command().status().map_err(|e| {
            StackError::editor(format!("could not run editor `{}`: {e}", self.command))
        })?;

        if !status.success() {
            return Err(StackError::editor(match status.code() {
                Some(code) => format!("editor `{}` exited with status {code}", self.command),
                None => format!("editor `{}` was terminated by a signal", self.command),
            }));
        }

        let edited = fs::read_to_string(&self.path)?;
        let _ = fs::remove_file(&self.path);
        Ok(edited)
    }
}

/// Pick the editor command.
///
/// Order: `PST_EDITOR`, the `editor` setting, `GIT_EDITOR`, git's
/// `core.editor`, `VISUAL`, `EDITOR`, then `vi`.
pub fn default_editor(configured: Option<&str>, core_editor: Option<&str>) -> String {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    non_empty(std::env::var("PST_EDITOR").ok())
        .or_else(|| non_empty(configured.map(str::to_string)))
        .or_else(|| non_empty(std::env::var("GIT_EDITOR").ok()))
        .or_else(|| non_empty(core_editor.map(str::to_string)))
        .or_else(|| non_empty(std::env::var("VISUAL").ok()))
        .or_else(|| non_empty(std::env::var("EDITOR").ok()))
        .unwrap_or_else(|| "vi".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_editor_env() {
        for var in ["PST_EDITOR", "GIT_EDITOR", "VISUAL", "EDITOR"] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_default_editor_precedence() {
        clear_editor_env();
        assert_eq!(default_editor(None, None), "vi");

        std::env::set_var("EDITOR", "nano");
        assert_eq!(default_editor(None, None), "nano");
        std::env::set_var("VISUAL", "emacs");
        assert_eq!(default_editor(None, None), "emacs");
        assert_eq!(default_editor(None, Some("vim")), "vim");
        std::env::set_var("GIT_EDITOR", "ed");
        assert_eq!(default_editor(None, Some("vim")), "ed");
        assert_eq!(default_editor(Some("code --wait"), Some("vim")), "code --wait");
        std::env::set_var("PST_EDITOR", "true");
        assert_eq!(default_editor(Some("code --wait"), Some("vim")), "true");

        std::env::set_var("PST_EDITOR", "  ");
        assert_eq!(default_editor(Some("code --wait"), None), "code --wait");
        clear_editor_env();
    }

    #[test]
    fn test_closure_editor() {
        let editor = |buffer: &str| -> Result<String> { Ok(buffer.to_uppercase()) };
        assert_eq!(editor.edit("abc").unwrap(), "ABC");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_external_editor_round_trip() {
        let tmp = TempDir::new().unwrap();
        let editor = ExternalEditor::new(
            "sed -i.bak -e 's/old/new/'",
            tmp.path().join(EDIT_FILE_NAME),
        );

        let edited = editor.edit("old subject\n").unwrap();
        assert_eq!(edited, "new subject\n");
        assert!(!editor.path().exists());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_external_editor_failure() {
        let tmp = TempDir::new().unwrap();
        let editor = ExternalEditor::new("false", tmp.path().join(EDIT_FILE_NAME));

        let err = editor.edit("buffer").unwrap_err();
        assert!(matches!(err, StackError::Editor(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
