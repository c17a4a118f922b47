mod common;

use common::{git, TestRepo};
use std::path::Path;
use std::process::{Command, Output};

/// Run `pst` inside the repository with a private HOME
fn pst(repo: &TestRepo, args: &[&str]) -> Output {
    pst_with_editor(repo, args, "false")
}

fn pst_with_editor(repo: &TestRepo, args: &[&str], editor: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pst"))
        .args(args)
        .current_dir(&repo.path)
        .env("HOME", repo.path.join(".git"))
        .env("PST_EDITOR", editor)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn assert_exit(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "stdout: {}\nstderr: {}",
        stdout(output),
        stderr(output)
    );
}

/// Editor script that replaces the buffer with `content`
#[cfg(unix)]
fn editor_script(dir: &Path, name: &str, content: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(
        &path,
        format!("#!/bin/sh\ncat > \"$1\" <<'EOF'\n{content}EOF\n"),
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

fn adopted(count: usize) -> TestRepo {
    let repo = TestRepo::new();
    for i in 0..count {
        let name = format!("p{i}");
        repo.commit(&name, &format!("{name}.txt"), &format!("{name}\n"));
    }
    let output = pst(&repo, &["init", "--adopt", &count.to_string()]);
    assert_exit(&output, 0);
    repo
}

#[test]
fn test_init_and_status() {
    let repo = adopted(3);
    let output = pst(&repo, &["status"]);
    assert_exit(&output, 0);
    let out = stdout(&output);
    for name in ["p0", "p1", "p2"] {
        assert!(out.contains(name), "missing {name} in {out}");
    }
    assert!(out.contains("3 applied, 0 unapplied"));

    let output = pst(&repo, &["init"]);
    assert_exit(&output, 2);
    assert!(stderr(&output).starts_with("error: branch `main` already has a patch stack"));
}

#[test]
fn test_uninitialized_branch_is_a_command_error() {
    let repo = TestRepo::new();
    let output = pst(&repo, &["status"]);
    assert_exit(&output, 2);
    assert!(stderr(&output).contains("run `pst init` first"));
}

#[test]
fn test_squash_with_inline_message() {
    let repo = adopted(3);
    let output = pst(&repo, &["squash", "-n", "q", "-m", "Joined", "p1", "p2"]);
    assert_exit(&output, 0);
    assert!(stdout(&output).contains("Squashed into `q`"));

    assert_eq!(git(&repo.path, &["log", "-1", "--format=%s"]), "Joined");
    assert_eq!(
        git(&repo.path, &["rev-parse", "HEAD"]),
        git(&repo.path, &["rev-parse", "refs/patches/main/q"])
    );
}

#[test]
fn test_squash_error_exit_codes() {
    let repo = adopted(3);

    let output = pst(&repo, &["squash", "-m", "x", "p1"]);
    assert_exit(&output, 2);
    assert_eq!(stderr(&output).trim(), "error: need at least two patches");

    let output = pst(&repo, &["squash", "-m", "x", "p1", "nope"]);
    assert_exit(&output, 1);
    assert_eq!(stderr(&output).trim(), "error: patch `nope` does not exist");

    let output = pst(&repo, &["squash", "-m", "x", "-n", "p0", "p1", "p2"]);
    assert_exit(&output, 2);
    assert!(stderr(&output).contains("already taken"));

    let output = pst(&repo, &["squash", "-m", "x", "--author", "nobody", "p1", "p2"]);
    assert_exit(&output, 1);
    assert!(stderr(&output).starts_with("error: incorrect \"name <email>\" string"));
}

#[test]
fn test_squash_resolves_unique_prefixes() {
    let repo = TestRepo::new();
    repo.commit("fix parser", "a.txt", "a\n");
    repo.commit("fix lexer", "b.txt", "b\n");
    repo.commit("docs", "c.txt", "c\n");
    assert_exit(&pst(&repo, &["init", "--adopt", "3"]), 0);

    let output = pst(&repo, &["squash", "-m", "x", "fix", "docs"]);
    assert_exit(&output, 1);
    assert!(stderr(&output).contains("ambiguous patch name `fix`: could be fix-lexer, fix-parser"));

    let output = pst(&repo, &["squash", "-n", "all", "-m", "x", "fix-p", "fix-l", "do"]);
    assert_exit(&output, 0);
    assert!(stdout(&pst(&repo, &["status"])).contains("all"));
}

#[cfg(unix)]
#[test]
fn test_squash_message_from_editor() {
    let repo = adopted(3);
    let editor = editor_script(&repo.path.join(".git"), "edit.sh", "From the editor\n");

    let output = pst_with_editor(&repo, &["squash", "p0", "p1"], &editor);
    assert_exit(&output, 0);
    assert!(stdout(&output).contains("Squashed into `from-the-editor`"));
    assert_eq!(git(&repo.path, &["log", "-2", "--format=%s"]), "p2\nFrom the editor");
    assert!(!repo.path.join(".git").join("PATCH_EDITMSG").exists());
}

#[cfg(unix)]
#[test]
fn test_empty_editor_message_aborts() {
    let repo = adopted(3);
    let head = repo.head();
    let editor = editor_script(&repo.path.join(".git"), "empty.sh", "# nothing here\n");

    let output = pst_with_editor(&repo, &["squash", "p0", "p1"], &editor);
    assert_exit(&output, 2);
    assert_eq!(
        stderr(&output).trim(),
        "error: aborting due to empty patch description"
    );
    assert_eq!(repo.head(), head);
}

#[test]
fn test_failing_editor_aborts() {
    let repo = adopted(2);
    let head = repo.head();

    let output = pst(&repo, &["squash", "p0", "p1"]);
    assert_exit(&output, 2);
    assert!(stderr(&output).starts_with("error: Editor error: editor `false` exited"));
    assert_eq!(repo.head(), head);
}

#[test]
fn test_conflict_exit_code_and_hard_undo() {
    let repo = TestRepo::new();
    repo.commit("p0", "p0.txt", "p0\n");
    repo.commit("p1", "f.txt", "one\n");
    repo.commit("p2", "f.txt", "two\n");
    assert_exit(&pst(&repo, &["init", "--adopt", "3"]), 0);
    let head = repo.head();

    let output = pst(&repo, &["squash", "-n", "q", "-m", "q", "p2", "p1"]);
    assert_exit(&output, 3);
    assert_eq!(stderr(&output).trim(), "error: conflicts while squashing");
    assert!(stdout(&output).contains("pst undo --hard"));
    assert!(repo.has_conflicts());

    let output = pst(&repo, &["pop"]);
    assert_exit(&output, 2);

    let output = pst(&repo, &["undo"]);
    assert_exit(&output, 2);

    let output = pst(&repo, &["undo", "--hard"]);
    assert_exit(&output, 0);
    assert_eq!(repo.head(), head);
    assert!(!repo.has_conflicts());
    assert_eq!(repo.read("f.txt"), "two\n");
}

#[test]
fn test_save_template() {
    let repo = adopted(3);
    let head = repo.head();

    let output = pst(&repo, &["squash", "--save-template", "-", "p2", "p0"]);
    assert_exit(&output, 0);
    let out = stdout(&output);
    assert!(out.starts_with("# Commit message from patch #1: p2\np2\n"));
    assert!(out.contains("# Commit message from patch #2: p0\np0\n"));
    assert_eq!(repo.head(), head);

    let target = repo.path.join(".git").join("template.txt");
    let output = pst(
        &repo,
        &["squash", "--save-template", target.to_str().unwrap(), "p0", "p1"],
    );
    assert_exit(&output, 0);
    let saved = std::fs::read_to_string(&target).unwrap();
    assert!(saved.starts_with("# Commit message from patch #1: p0\n"));
}

#[test]
fn test_push_pop_and_log() {
    let repo = adopted(3);

    let output = pst(&repo, &["pop", "--all"]);
    assert_exit(&output, 0);
    assert!(!repo.exists("p0.txt"));

    let output = pst(&repo, &["push", "p2"]);
    assert_exit(&output, 0);
    assert!(stdout(&output).contains("Pushed `p2`"));
    assert!(repo.exists("p2.txt"));
    assert!(!repo.exists("p1.txt"));

    let output = pst(&repo, &["push", "p2"]);
    assert_exit(&output, 2);
    assert!(stderr(&output).contains("already applied"));

    let output = pst(&repo, &["undo", "-n", "2"]);
    assert_exit(&output, 0);
    assert!(repo.exists("p0.txt"));

    let output = pst(&repo, &["log"]);
    assert_exit(&output, 0);
    let out = stdout(&output);
    for operation in ["init", "pop", "push", "undo"] {
        assert!(out.contains(operation), "missing {operation} in {out}");
    }

    let output = pst(&repo, &["log", "-n", "1"]);
    assert_exit(&output, 0);
    assert_eq!(stdout(&output).lines().count(), 1);
}

#[test]
fn test_config_round_trip() {
    let repo = adopted(1);

    assert_exit(&pst(&repo, &["config", "set", "author.name", "Config User"]), 0);
    let output = pst(&repo, &["config", "get", "author.name"]);
    assert_exit(&output, 0);
    assert_eq!(stdout(&output).trim(), "author.name = Config User");

    let output = pst(&repo, &["config", "get", "no.such.key"]);
    assert_exit(&output, 2);

    assert_exit(&pst(&repo, &["config", "set", "--global", "editor", "nano"]), 0);
    let output = pst(&repo, &["config", "list"]);
    assert_exit(&output, 0);
    assert!(stdout(&output).contains("editor = nano"));
}

#[test]
fn test_completions() {
    let repo = TestRepo::new();
    let output = pst(&repo, &["completions", "bash"]);
    assert_exit(&output, 0);
    assert!(stdout(&output).contains("pst"));
}
