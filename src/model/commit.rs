//! Change-set identity.
//!
//! Replaying a commit onto another branch gives it a new hash, so porting
//! decisions can never compare hashes across branches. [`Commit`] carries
//! the structural fields and [`Commit::matches`] compares them under an
//! explicitly supplied [`CompareMode`]:
//!
//! - [`CompareMode::Strict`]: author identity, authored timestamp, raw
//!   message, and the changed-path set must all match. Used when screening
//!   source commits against the target branch.
//! - [`CompareMode::Loose`]: author identity and timestamp must match and
//!   the *cleaned* messages must match; the path set is ignored because a
//!   commit can be ported piecewise over several runs. Used when hunting
//!   for partially ported remnants.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::types::{CommitSha, ValidationError};

/// Bracketed tags (`[FIX]`, `[16.0][MIG]`…) and version-like tokens, both
/// rewritten routinely when a commit moves across release branches.
static CLEAN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*\]|\d+\.\d+").expect("clean pattern compiles"));

// ---------------------------------------------------------------------------
// CompareMode
// ---------------------------------------------------------------------------

/// Comparison context for structural change-set equality, passed explicitly
/// into every comparison call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareMode {
    /// Full structural match including the changed-path set.
    Strict,
    /// Cleaned-message match, tolerant of partial ports.
    Loose,
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// One change-set, as read from a branch's history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    /// Low-level identifier. Identifies the commit within one branch only;
    /// never part of structural equality.
    pub sha: CommitSha,
    pub author_name: String,
    pub author_email: String,
    /// Author date as Unix epoch seconds. Replay preserves it.
    pub authored_at: i64,
    /// First line of the message.
    pub summary: String,
    /// Full raw message.
    pub message: String,
    /// All files the commit touched, across every component.
    pub paths: BTreeSet<String>,
    /// Parent hashes; more than one marks a merge commit.
    pub parents: Vec<String>,
}

impl Commit {
    /// Build a [`Commit`] from a raw log entry, validating the hash.
    pub fn from_log(entry: fwport_git::LogEntry) -> Result<Self, ValidationError> {
        Ok(Self {
            sha: CommitSha::new(&entry.sha)?,
            author_name: entry.author_name,
            author_email: entry.author_email,
            authored_at: entry.authored_at,
            summary: entry.summary,
            message: entry.message,
            paths: entry.paths.into_iter().collect(),
            parents: entry.parents,
        })
    }

    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Top-level path components touched by this commit.
    #[must_use]
    pub fn components(&self) -> BTreeSet<&str> {
        self.paths.iter().map(|p| top_level(p)).collect()
    }

    /// Structural equality under the given comparison context.
    #[must_use]
    pub fn matches(&self, other: &Self, mode: CompareMode) -> bool {
        if self.author_name != other.author_name
            || self.author_email != other.author_email
            || self.authored_at != other.authored_at
        {
            return false;
        }
        match mode {
            CompareMode::Strict => self.message == other.message && self.paths == other.paths,
            CompareMode::Loose => clean_message(&self.message) == clean_message(&other.message),
        }
    }
}

/// Top-level component of a repository-relative path.
#[must_use]
pub fn top_level(path: &str) -> &str {
    path.split('/').next().unwrap_or(path)
}

/// Normalize a commit message for loose comparison.
///
/// Replay turns message line breaks into spaces, so newlines are flattened
/// and doubled spaces collapsed before tags and version tokens are
/// stripped.
#[must_use]
pub fn clean_message(message: &str) -> String {
    let flattened = message.replace('\n', " ").replace("  ", " ");
    CLEAN_PATTERN.replace_all(&flattened, "").trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
