use crate::common::file::{FileSpec, write_file};
use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use std::path::Path;

pub const AUTHOR_NAME: &str = "fake_user";
pub const AUTHOR_EMAIL: &str = "fake_email@email.com";
pub const AUTHOR_DATE: &str = "2023-01-01 12:00:00 +0000";

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Repository with one commit holding `1.txt`, `a/2.txt` and `a/b/3.txt`
#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_graft_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    write_file(FileSpec::new(
        repository_dir.path().join("1.txt"),
        "one\n".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("2.txt"),
        "two\n".to_string(),
    ));
    write_file(FileSpec::new(
        repository_dir.path().join("a").join("b").join("3.txt"),
        "three\n".to_string(),
    ));

    run_graft_command(repository_dir.path(), &["add", "."])
        .assert()
        .success();
    graft_commit(repository_dir.path(), "Initial commit")
        .assert()
        .success();

    repository_dir
}

pub fn run_graft_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("graft").expect("Failed to find graft binary");
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("RUST_LOG");
    cmd.current_dir(dir);
    cmd.args(args);
    cmd
}

fn with_author(mut cmd: Command) -> Command {
    cmd.envs(vec![
        ("GIT_AUTHOR_NAME", AUTHOR_NAME),
        ("GIT_AUTHOR_EMAIL", AUTHOR_EMAIL),
        ("GIT_AUTHOR_DATE", AUTHOR_DATE), // %Y-%m-%d %H:%M:%S %z
    ]);
    cmd
}

pub fn graft_commit(dir: &Path, message: &str) -> Command {
    with_author(run_graft_command(dir, &["commit", "-m", message]))
}

pub fn graft_merge(dir: &Path, args: &[&str]) -> Command {
    let mut full = vec!["merge"];
    full.extend_from_slice(args);
    with_author(run_graft_command(dir, &full))
}

/// Write files, stage everything and commit
pub fn commit_files(dir: &Path, files: &[(&str, &str)], message: &str) {
    for (path, content) in files {
        write_file(FileSpec::new(dir.join(path), content.to_string()));
    }
    run_graft_command(dir, &["add", "."]).assert().success();
    graft_commit(dir, message).assert().success();
}

pub fn rev_parse(dir: &Path, revision: &str) -> String {
    let output = run_graft_command(dir, &["rev-parse", revision])
        .output()
        .expect("Failed to run rev-parse");
    assert!(output.status.success(), "rev-parse {revision} failed");

    String::from_utf8(output.stdout)
        .expect("rev-parse output is not utf-8")
        .trim()
        .to_string()
}

/// Get the current HEAD commit SHA
pub fn get_head_commit_sha(dir: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let head_path = dir.join(".git").join("HEAD");
    let head_content = std::fs::read_to_string(head_path)?;

    // HEAD file contains either a commit SHA or a ref like "ref: refs/heads/main"
    if let Some(ref_path) = head_content.strip_prefix("ref: ") {
        let ref_file = dir.join(".git").join(ref_path.trim());
        let commit_sha = std::fs::read_to_string(ref_file)?;
        Ok(commit_sha.trim().to_string())
    } else {
        Ok(head_content.trim().to_string())
    }
}

/// Parent ids listed in a commit's `cat-file` rendering
pub fn parents_of(dir: &Path, revision: &str) -> Vec<String> {
    let output = run_graft_command(dir, &["cat-file", "-p", revision])
        .output()
        .expect("Failed to run cat-file");

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.strip_prefix("parent "))
        .map(str::to_string)
        .collect()
}
