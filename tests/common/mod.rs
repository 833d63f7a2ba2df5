//! Shared helpers for fwport integration tests.
//!
//! Every test builds throwaway git repositories under a temp directory:
//! an upstream carrying the branch pair, a clone to run in (remote
//! `origin`), and optionally a bare fork to push to. The forge is an
//! in-memory stub mapping commits to pull-request data; answers come
//! from a scripted decider.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use fwport::prompt::Decider;
use fwport_github::{Forge, GithubError, NewPullRequest, PullRequestData, UserData};

pub fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .status()
        .expect("failed to run git");
    assert!(status.success(), "git {args:?} failed");
}

pub fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(out.status.success(), "git {args:?} failed");
    String::from_utf8(out.stdout).unwrap().trim().to_string()
}

/// Initialize a repository on `branch` with a committer identity.
pub fn init_repo(dir: &Path, branch: &str) {
    std::fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "--quiet", "-b", branch]);
    git(dir, &["config", "user.name", "Alice"]);
    git(dir, &["config", "user.email", "alice@example.com"]);
}

/// Commit one file, returning the new head.
pub fn commit_file(dir: &Path, file: &str, content: &str, message: &str) -> String {
    commit_files(dir, &[(file, content)], message)
}

/// Commit several files at once, returning the new head.
pub fn commit_files(dir: &Path, files: &[(&str, &str)], message: &str) -> String {
    for (file, content) in files {
        let path = dir.join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
    }
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "--quiet", "-m", message]);
    git_stdout(dir, &["rev-parse", "HEAD"])
}

/// Commit one file under another author (the committer stays the
/// repository default).
pub fn commit_file_as(
    dir: &Path,
    file: &str,
    content: &str,
    message: &str,
    author: &str,
) -> String {
    let path = dir.join(file);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    git(dir, &["add", "-A"]);
    git(
        dir,
        &["commit", "--quiet", "-m", message, "--author", author],
    );
    git_stdout(dir, &["rev-parse", "HEAD"])
}

/// Clone `upstream` as `name` under `tmp`; the clone's remote is `origin`.
pub fn clone_repo(tmp: &Path, upstream: &Path, name: &str) -> PathBuf {
    git(tmp, &["clone", "--quiet", upstream.to_str().unwrap(), name]);
    let work = tmp.join(name);
    git(&work, &["config", "user.name", "Alice"]);
    git(&work, &["config", "user.email", "alice@example.com"]);
    work
}

/// Bare repository wired into `work` as remote `name`.
pub fn add_bare_remote(tmp: &Path, work: &Path, name: &str) -> PathBuf {
    let dir_name = format!("{name}.git");
    git(tmp, &["init", "--quiet", "--bare", &dir_name]);
    let bare = tmp.join(dir_name);
    git(work, &["remote", "add", name, bare.to_str().unwrap()]);
    bare
}

// ---------------------------------------------------------------------------
// Binary runners
// ---------------------------------------------------------------------------

/// Run the fwport binary with the given args in the given directory.
pub fn fwport_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fwport"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to execute fwport")
}

/// Run fwport and assert it succeeds. Returns stdout as string.
pub fn fwport_ok(dir: &Path, args: &[&str]) -> String {
    let out = fwport_in(dir, args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "fwport {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.to_string()
}

/// Run fwport and assert it fails. Returns stderr as string.
pub fn fwport_fails(dir: &Path, args: &[&str]) -> String {
    let out = fwport_in(dir, args);
    assert!(
        !out.status.success(),
        "Expected fwport {} to fail, but it succeeded.\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}

// ---------------------------------------------------------------------------
// Scripted decider
// ---------------------------------------------------------------------------

/// Answers questions from a fixed script; anything past the script is a
/// "no". Records every question asked.
pub struct Script {
    answers: VecDeque<bool>,
    pub asked: Vec<String>,
}

impl Script {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            asked: Vec::new(),
        }
    }
}

impl Decider for Script {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        self.asked.push(question.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}

// ---------------------------------------------------------------------------
// Stub forge
// ---------------------------------------------------------------------------

/// Forge stub backed by in-memory maps.
#[derive(Default)]
pub struct MapForge {
    pulls_by_commit: HashMap<String, PullRequestData>,
    commits_by_pull: HashMap<u64, Vec<String>>,
    pub open_pr: Option<String>,
    pub created: RefCell<Vec<NewPullRequest>>,
}

impl MapForge {
    pub fn map_commit(&mut self, sha: &str, pr: &PullRequestData) {
        self.pulls_by_commit.insert(sha.to_string(), pr.clone());
        self.commits_by_pull
            .entry(pr.number)
            .or_default()
            .push(sha.to_string());
    }
}

impl Forge for MapForge {
    fn pull_for_commit(&self, sha: &str) -> Result<Option<PullRequestData>, GithubError> {
        Ok(self.pulls_by_commit.get(sha).cloned())
    }

    fn pull_request_commit_shas(&self, number: u64) -> Result<Vec<String>, GithubError> {
        Ok(self.commits_by_pull.get(&number).cloned().unwrap_or_default())
    }

    fn search_open_pull_request(
        &self,
        _base: &str,
        _title: &str,
    ) -> Result<Option<String>, GithubError> {
        Ok(self.open_pr.clone())
    }

    fn create_pull_request(&self, payload: &NewPullRequest) -> Result<String, GithubError> {
        self.created.borrow_mut().push(payload.clone());
        let number = 100 + self.created.borrow().len();
        Ok(format!("https://github.com/acme/repo/pull/{number}"))
    }
}

/// Merged pull-request data for the stub.
pub fn pr(number: u64, title: &str, merged_at: &str) -> PullRequestData {
    PullRequestData {
        number,
        html_url: format!("https://github.com/acme/repo/pull/{number}"),
        user: UserData {
            login: "alice".to_string(),
        },
        title: title.to_string(),
        body: Some(String::new()),
        merged_at: Some(merged_at.to_string()),
        base: None,
    }
}
