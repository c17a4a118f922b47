/// Patch stack error types
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input: bad patch name, unknown patch, bad author string
    #[error("{0}")]
    General(String),

    /// Request is invalid given the current stack state
    #[error("{0}")]
    Command(String),

    /// Patch lookup failed
    #[error("patch `{0}` does not exist")]
    NotFound(String),

    /// A push stopped on a merge conflict; the stack is left conflicted
    #[error("{message}")]
    Conflict {
        message: String,
        patch: String,
        paths: Vec<String>,
    },

    /// Local changes or unresolved conflicts block a non-hard restore
    #[error("local changes or conflicts in the working tree; use `--hard` to discard them or resolve first")]
    DirtyWorkingTree,

    /// Editor could not be run or exited unsuccessfully
    #[error("Editor error: {0}")]
    Editor(String),
}

/// Coarse classification used by the CLI for exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    General,
    Command,
    Conflict,
}

impl StackError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        StackError::Config(msg.into())
    }

    pub fn general<S: Into<String>>(msg: S) -> Self {
        StackError::General(msg.into())
    }

    pub fn command<S: Into<String>>(msg: S) -> Self {
        StackError::Command(msg.into())
    }

    pub fn editor<S: Into<String>>(msg: S) -> Self {
        StackError::Editor(msg.into())
    }

    pub fn conflict<S: Into<String>>(message: S, patch: S, paths: Vec<String>) -> Self {
        StackError::Conflict {
            message: message.into(),
            patch: patch.into(),
            paths,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StackError::General(_) | StackError::NotFound(_) => ErrorKind::General,
            StackError::Conflict { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Command,
        }
    }

    /// Process exit code: 1 general, 2 command, 3 conflict
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::General => 1,
            ErrorKind::Command => 2,
            ErrorKind::Conflict => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, StackError>;
