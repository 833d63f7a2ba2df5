//! Git subprocess layer for fwport.
//!
//! Every operation shells out to the `git` binary with terminal prompts
//! disabled, so a missing credential fails fast instead of hanging an
//! unattended run. The caller's git configuration is inherited: patch
//! replay (`git am`) needs the operator's committer identity.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

// ---------------------------------------------------------------------------
// GitError
// ---------------------------------------------------------------------------

/// Errors from the git subprocess layer.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// The git binary could not be spawned at all.
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    /// git exited with a non-zero status.
    #[error("git {args} failed{}: {stderr}", exit_label(.code))]
    CommandFailed {
        /// The argument list that was run, joined with spaces.
        args: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// git produced output this layer could not parse.
    #[error("unexpected git output for {context}: {detail}")]
    Parse {
        /// The operation whose output was malformed.
        context: String,
        /// What was wrong with it.
        detail: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!(" (exit code {c})"),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Data records
// ---------------------------------------------------------------------------

/// One commit as read from `git log`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// Full 40-character commit hash.
    pub sha: String,
    pub author_name: String,
    pub author_email: String,
    /// Author date as Unix epoch seconds.
    pub authored_at: i64,
    /// Parent hashes (empty for a root commit).
    pub parents: Vec<String>,
    /// First line of the message.
    pub summary: String,
    /// Full raw message.
    pub message: String,
    /// Files touched by the commit, as recorded by `--name-only`.
    pub paths: Vec<String>,
}

/// Status letter of one file-level diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    /// Type change, unmerged, or anything else git may report.
    Other,
}

impl DiffStatus {
    fn from_letter(letter: char) -> Self {
        match letter {
            'A' => Self::Added,
            'M' => Self::Modified,
            'D' => Self::Deleted,
            'R' => Self::Renamed,
            'C' => Self::Copied,
            _ => Self::Other,
        }
    }

    /// Single-letter form, as git prints it.
    #[must_use]
    pub fn letter(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
            Self::Renamed => 'R',
            Self::Copied => 'C',
            Self::Other => 'T',
        }
    }
}

/// One file-level diff of a commit, from `git diff-tree --name-status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffEntry {
    pub status: DiffStatus,
    /// Pre-image path (equal to `b_path` unless renamed/copied).
    pub a_path: String,
    /// Post-image path.
    pub b_path: String,
}

/// Result of applying a patch series with `git am`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyResult {
    Applied,
    /// The series did not apply cleanly; an `am` session is left open.
    Failed {
        /// Combined stdout/stderr from git, for the operator.
        output: String,
    },
}

// ---------------------------------------------------------------------------
// GitRepo
// ---------------------------------------------------------------------------

/// Handle on a local working tree. All commands run with the repository
/// root as the working directory.
#[derive(Clone, Debug)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output, GitError> {
        debug!(args = args.join(" "), "running git");
        Ok(self.command(args).output()?)
    }

    /// Run a command, requiring exit status 0.
    fn run(&self, args: &[&str]) -> Result<(), GitError> {
        let out = self.output(args)?;
        if out.status.success() {
            Ok(())
        } else {
            Err(command_failed(args, &out))
        }
    }

    /// Run a command, requiring exit status 0, and return trimmed stdout.
    fn stdout(&self, args: &[&str]) -> Result<String, GitError> {
        let out = self.output(args)?;
        if out.status.success() {
            Ok(String::from_utf8_lossy(&out.stdout).trim_end().to_string())
        } else {
            Err(command_failed(args, &out))
        }
    }

    // ---- working tree state ----

    /// True when no tracked file has uncommitted changes. Untracked files
    /// do not count as dirty.
    pub fn is_clean(&self) -> Result<bool, GitError> {
        let out = self.stdout(&["status", "--porcelain"])?;
        Ok(out.lines().all(|line| line.starts_with("??")))
    }

    /// Paths of untracked files in the working tree.
    pub fn untracked_files(&self) -> Result<Vec<String>, GitError> {
        let out = self.stdout(&["status", "--porcelain"])?;
        Ok(out
            .lines()
            .filter_map(|line| line.strip_prefix("?? "))
            .map(ToString::to_string)
            .collect())
    }

    // ---- remotes and refs ----

    pub fn remotes(&self) -> Result<Vec<String>, GitError> {
        let out = self.stdout(&["remote"])?;
        Ok(out.lines().map(ToString::to_string).collect())
    }

    pub fn fetch(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run(&["fetch", remote, branch])
    }

    /// Resolve a reference to a full commit hash.
    pub fn rev_parse(&self, refname: &str) -> Result<String, GitError> {
        self.stdout(&["rev-parse", "--verify", &format!("{refname}^{{commit}}")])
    }

    /// Whether a reference resolves to a commit.
    pub fn ref_exists(&self, refname: &str) -> Result<bool, GitError> {
        let out = self.output(&[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("{refname}^{{commit}}"),
        ])?;
        Ok(out.status.success())
    }

    /// Whether a local branch head exists.
    pub fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        self.ref_exists(&format!("refs/heads/{name}"))
    }

    /// Whether `ancestor` is an ancestor of `descendant`.
    ///
    /// `git merge-base --is-ancestor` answers through the exit code: 0 for
    /// yes, 1 for no, anything else is an error.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, GitError> {
        let args = ["merge-base", "--is-ancestor", ancestor, descendant];
        let out = self.output(&args)?;
        match out.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_failed(&args, &out)),
        }
    }

    // ---- branches ----

    pub fn checkout(&self, refname: &str) -> Result<(), GitError> {
        self.run(&["checkout", "--quiet", refname])
    }

    /// Create a branch at `start` and check it out.
    pub fn create_branch(&self, name: &str, start: &str) -> Result<(), GitError> {
        self.run(&["checkout", "--quiet", "-b", name, start])
    }

    pub fn delete_branch(&self, name: &str) -> Result<(), GitError> {
        self.run(&["branch", "-D", name])
    }

    // ---- history ----

    /// Read the history reachable from `refname`, newest first, optionally
    /// restricted to commits touching `path`.
    ///
    /// One `git log` invocation carries everything the caller needs: ASCII
    /// record/unit separators delimit the fixed fields and `--name-only`
    /// appends the touched paths to each record.
    pub fn log(&self, refname: &str, path: Option<&str>) -> Result<Vec<LogEntry>, GitError> {
        let format = "--format=%x1e%H%x1f%an%x1f%ae%x1f%at%x1f%P%x1f%s%x1f%B%x1f";
        let mut args = vec!["log", format, "--name-only", refname];
        if let Some(p) = path {
            args.push("--");
            args.push(p);
        }
        let out = self.stdout(&args)?;
        out.split('\x1e')
            .filter(|record| !record.trim().is_empty())
            .map(parse_log_record)
            .collect()
    }

    /// Read a single commit by hash. Returns `None` when the hash does not
    /// resolve locally.
    pub fn find_commit(&self, sha: &str) -> Result<Option<LogEntry>, GitError> {
        if !self.ref_exists(sha)? {
            return Ok(None);
        }
        let format = "--format=%x1e%H%x1f%an%x1f%ae%x1f%at%x1f%P%x1f%s%x1f%B%x1f";
        let out = self.stdout(&["log", format, "--name-only", "-1", sha])?;
        let record = out
            .split('\x1e')
            .find(|r| !r.trim().is_empty())
            .ok_or_else(|| GitError::Parse {
                context: format!("log -1 {sha}"),
                detail: "empty output".to_string(),
            })?;
        parse_log_record(record).map(Some)
    }

    /// File-level diffs of a commit against its first parent, with rename
    /// detection. Root commits diff against the empty tree.
    pub fn diff_entries(&self, sha: &str) -> Result<Vec<DiffEntry>, GitError> {
        let out = self.stdout(&[
            "diff-tree",
            "-r",
            "-M",
            "--no-commit-id",
            "--name-status",
            "--root",
            sha,
        ])?;
        out.lines()
            .filter(|line| !line.is_empty())
            .map(|line| parse_diff_line(line, sha))
            .collect()
    }

    /// Top-level directory entries of a commit's tree.
    pub fn top_level_dirs(&self, refname: &str) -> Result<Vec<String>, GitError> {
        let out = self.stdout(&["ls-tree", refname])?;
        Ok(out
            .lines()
            .filter_map(|line| {
                // <mode> SP <type> SP <hash> TAB <name>
                let (meta, name) = line.split_once('\t')?;
                meta.split_whitespace()
                    .nth(1)
                    .filter(|t| *t == "tree")
                    .map(|_| name.to_string())
            })
            .collect())
    }

    // ---- patches ----

    /// Generate a patch for a single commit, restricted to `paths`.
    /// Returns the files written into `out_dir`.
    pub fn format_patch(
        &self,
        out_dir: &Path,
        sha: &str,
        paths: &[String],
    ) -> Result<Vec<PathBuf>, GitError> {
        let dir = out_dir.display().to_string();
        let mut args = vec!["format-patch", "--keep-subject", "-o", &dir, "-1", sha, "--"];
        args.extend(paths.iter().map(String::as_str));
        let out = self.stdout(&args)?;
        Ok(out.lines().map(PathBuf::from).collect())
    }

    /// Generate patches for every commit in `exclude_ref..include_ref`
    /// touching `path`. Returns the files written into `out_dir`.
    pub fn format_patch_range(
        &self,
        out_dir: &Path,
        exclude_ref: &str,
        include_ref: &str,
        path: &str,
    ) -> Result<Vec<PathBuf>, GitError> {
        let dir = out_dir.display().to_string();
        let range = format!("{exclude_ref}..{include_ref}");
        let out = self.stdout(&[
            "format-patch",
            "--keep-subject",
            "-o",
            &dir,
            &range,
            "--",
            path,
        ])?;
        Ok(out.lines().map(PathBuf::from).collect())
    }

    /// Apply a patch series with three-way merge, keeping subjects verbatim.
    ///
    /// A non-zero exit is reported as [`ApplyResult::Failed`] with the
    /// combined output; the `am` session stays open for the operator to
    /// finish or abort.
    pub fn apply_patches(&self, patches: &[PathBuf]) -> Result<ApplyResult, GitError> {
        let mut args: Vec<String> = vec!["am".into(), "-3".into(), "--keep".into()];
        args.extend(patches.iter().map(|p| p.display().to_string()));
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.output(&arg_refs)?;
        if out.status.success() {
            Ok(ApplyResult::Applied)
        } else {
            let mut output = String::from_utf8_lossy(&out.stdout).trim_end().to_string();
            let stderr = String::from_utf8_lossy(&out.stderr);
            if !stderr.trim().is_empty() {
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(stderr.trim_end());
            }
            Ok(ApplyResult::Failed { output })
        }
    }

    /// Abort an open `git am` session, restoring the pre-apply state.
    pub fn abort_patch_session(&self) -> Result<(), GitError> {
        self.run(&["am", "--abort"])
    }

    // ---- publishing ----

    /// Force-update `branch` on `remote`, refusing to clobber commits this
    /// repository has not seen.
    pub fn push_force_with_lease(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run(&["push", "--force-with-lease", remote, branch])
    }

    // ---- commits ----

    pub fn head_sha(&self) -> Result<String, GitError> {
        self.rev_parse("HEAD")
    }

    /// Stage everything and commit. Used after a formatting-hook pass.
    pub fn commit_all(&self, message: &str, no_verify: bool) -> Result<(), GitError> {
        self.run(&["add", "-A"])?;
        let mut args = vec!["commit", "-m", message];
        if no_verify {
            args.push("--no-verify");
        }
        self.run(&args)
    }
}

fn command_failed(args: &[&str], out: &Output) -> GitError {
    GitError::CommandFailed {
        args: args.join(" "),
        code: out.status.code(),
        stderr: String::from_utf8_lossy(&out.stderr).trim_end().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_log_record(record: &str) -> Result<LogEntry, GitError> {
    let parse_err = |detail: &str| GitError::Parse {
        context: "log record".to_string(),
        detail: detail.to_string(),
    };

    let mut fields = record.splitn(8, '\x1f');
    let sha = fields.next().ok_or_else(|| parse_err("missing hash"))?;
    let author_name = fields.next().ok_or_else(|| parse_err("missing author name"))?;
    let author_email = fields
        .next()
        .ok_or_else(|| parse_err("missing author email"))?;
    let authored_raw = fields.next().ok_or_else(|| parse_err("missing author date"))?;
    let parents_raw = fields.next().ok_or_else(|| parse_err("missing parents"))?;
    let summary = fields.next().ok_or_else(|| parse_err("missing summary"))?;
    let message = fields.next().ok_or_else(|| parse_err("missing message"))?;
    let name_only = fields.next().unwrap_or("");

    let authored_at = authored_raw
        .trim()
        .parse::<i64>()
        .map_err(|e| parse_err(&format!("author date '{authored_raw}': {e}")))?;

    Ok(LogEntry {
        sha: sha.trim().to_string(),
        author_name: author_name.to_string(),
        author_email: author_email.to_string(),
        authored_at,
        parents: parents_raw.split_whitespace().map(ToString::to_string).collect(),
        summary: summary.to_string(),
        // %B carries a trailing newline; the separators around it do not.
        message: message.trim_end_matches('\n').to_string(),
        paths: name_only
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect(),
    })
}

fn parse_diff_line(line: &str, sha: &str) -> Result<DiffEntry, GitError> {
    let mut parts = line.split('\t');
    let status_token = parts.next().unwrap_or_default();
    let first = parts.next().ok_or_else(|| GitError::Parse {
        context: format!("diff-tree {sha}"),
        detail: format!("no path in line '{line}'"),
    })?;
    let second = parts.next();

    let status = DiffStatus::from_letter(status_token.chars().next().unwrap_or(' '));
    // Renames and copies list both sides; everything else lists one path.
    let (a_path, b_path) = match second {
        Some(new) => (first.to_string(), new.to_string()),
        None => (first.to_string(), first.to_string()),
    };
    Ok(DiffEntry { status, a_path, b_path })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
