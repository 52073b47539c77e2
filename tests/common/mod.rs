#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::process::Command;

pub fn has_git() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

pub fn git(dir: &Path, args: &[&str]) {
    git_at(dir, args, None);
}

/// Runs git with author and committer dates pinned to `date` (local time).
pub fn git_at(dir: &Path, args: &[&str], date: Option<&str>) {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(dir);
    if let Some(date) = date {
        cmd.env("GIT_AUTHOR_DATE", date).env("GIT_COMMITTER_DATE", date);
    }
    let status = cmd.status().unwrap();
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

pub fn init_git_repo(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["config", "core.autocrlf", "false"]);
    git(dir, &["config", "core.safecrlf", "false"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["config", "user.email", "you@example.com"]);
    git(dir, &["config", "user.name", "Your Name"]);
}

pub fn write_file(dir: &Path, name: &str, content: &[u8]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut f = File::create(&path).unwrap();
    f.write_all(content).unwrap();
    f.sync_all().unwrap();
}

pub fn lines(n: usize) -> String {
    (0..n).map(|i| format!("line {i}\n")).collect()
}

/// Writes every file, stages everything and commits at `date`.
pub fn commit_files(dir: &Path, files: &[(&str, &str)], message: &str, date: &str) {
    for (name, content) in files {
        write_file(dir, name, content.as_bytes());
    }
    git(dir, &["add", "-A"]);
    git_at(dir, &["commit", "-q", "-m", message], Some(date));
}

/// Writes an executable shell script standing in for `git`.
#[cfg(unix)]
pub fn fake_git(dir: &Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir).unwrap();
    let script = dir.join("git");
    fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}
