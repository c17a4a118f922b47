//! Helpers shared by the integration tests: throwaway repositories driven
//! through the git command line.
#![allow(dead_code)]

use patch_stack::stack::{Stack, StackManager};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub const DEFAULT_NAME: &str = "Test User";
pub const DEFAULT_EMAIL: &str = "test@example.com";

/// Run git in `repo_path`, panicking with its stderr on failure
pub fn git(repo_path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub struct TestRepo {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TestRepo {
    /// Repository on `main` with one commit holding README.md and `f.txt`
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        git(&path, &["init", "-q", "-b", "main"]);
        git(&path, &["config", "user.name", DEFAULT_NAME]);
        git(&path, &["config", "user.email", DEFAULT_EMAIL]);
        git(&path, &["config", "commit.gpgsign", "false"]);
        std::fs::write(path.join("README.md"), "# Test Repo\n").unwrap();
        std::fs::write(path.join("f.txt"), "zero\n").unwrap();
        git(&path, &["add", "."]);
        git(&path, &["commit", "-q", "-m", "Initial commit"]);

        Self { _dir: dir, path }
    }

    /// Write `file` and commit it with `message` as subject
    pub fn commit(&self, message: &str, file: &str, content: &str) -> String {
        self.commit_as(message, file, content, None)
    }

    pub fn commit_as(
        &self,
        message: &str,
        file: &str,
        content: &str,
        author: Option<&str>,
    ) -> String {
        std::fs::write(self.path.join(file), content).unwrap();
        git(&self.path, &["add", file]);
        match author {
            Some(author) => git(
                &self.path,
                &["commit", "-q", "-m", message, "--author", author],
            ),
            None => git(&self.path, &["commit", "-q", "-m", message]),
        };
        self.head()
    }

    pub fn head(&self) -> String {
        git(&self.path, &["rev-parse", "HEAD"])
    }

    pub fn read(&self, file: &str) -> String {
        std::fs::read_to_string(self.path.join(file)).unwrap()
    }

    pub fn exists(&self, file: &str) -> bool {
        self.path.join(file).exists()
    }

    pub fn has_conflicts(&self) -> bool {
        !git(&self.path, &["diff", "--name-only", "--diff-filter=U"]).is_empty()
    }

    pub fn manager(&self) -> StackManager {
        StackManager::new(&self.path).unwrap()
    }

    /// Commit `p0`..`p{count-1}`, each adding its own file, and adopt them
    pub fn numbered_stack(&self, count: usize) -> Stack {
        for i in 0..count {
            let name = format!("p{i}");
            self.commit(&name, &format!("{name}.txt"), &format!("{name}\n"));
        }
        self.manager().initialize(count).unwrap()
    }
}

pub fn applied_names(stack: &Stack) -> Vec<String> {
    stack.applied().iter().map(|p| p.name.to_string()).collect()
}

pub fn unapplied_names(stack: &Stack) -> Vec<String> {
    stack.unapplied().iter().map(|p| p.name.to_string()).collect()
}
