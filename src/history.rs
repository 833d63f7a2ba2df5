//! Branch history reading.
//!
//! Wraps `git log` into filtered change-set sequences, newest first. Two
//! views exist per branch: path-scoped (only changes touching one
//! component) and full. Merge commits, automation-account commits and
//! auto-generated translation commits are excluded from every view.

use fwport_git::GitRepo;
use tracing::debug;

use crate::config::HistoryConfig;
use crate::error::PortError;
use crate::model::commit::{Commit, CompareMode};

/// Author emails of automation accounts whose commits are never ported.
pub const BOT_AUTHOR_EMAILS: &[&str] = &[
    "transbot@odoo-community.org",
    "oca-git-bot@odoo-community.org",
    "oca+oca-travis@odoo-community.org",
    "oca-ci@odoo-community.org",
    "shopinvader-git-bot@shopinvader.com",
];

/// Summary markers of auto-generated commits (translation imports).
pub const AUTOGENERATED_SUMMARY_MARKERS: &[&str] = &[
    "Translated using Weblate",
    "Added translation using Weblate",
];

// ---------------------------------------------------------------------------
// ExclusionRules
// ---------------------------------------------------------------------------

/// Exclusion rules applied uniformly to every history walk.
#[derive(Clone, Debug)]
pub struct ExclusionRules {
    bot_emails: Vec<String>,
    skip_summaries: Vec<String>,
}

impl ExclusionRules {
    /// Built-in lists plus the configured extras.
    #[must_use]
    pub fn from_config(history: &HistoryConfig) -> Self {
        let mut bot_emails: Vec<String> =
            BOT_AUTHOR_EMAILS.iter().map(|e| (*e).to_owned()).collect();
        bot_emails.extend(history.extra_bot_emails.iter().cloned());
        let mut skip_summaries: Vec<String> = AUTOGENERATED_SUMMARY_MARKERS
            .iter()
            .map(|m| (*m).to_owned())
            .collect();
        skip_summaries.extend(history.extra_skip_summaries.iter().cloned());
        Self {
            bot_emails,
            skip_summaries,
        }
    }

    /// Whether a change-set is excluded from history walks.
    ///
    /// Merge commits, commits authored by an automation account, and
    /// commits whose summary contains an auto-generated marker are all
    /// excluded.
    #[must_use]
    pub fn excludes(&self, commit: &Commit) -> bool {
        commit.is_merge()
            || self.bot_emails.iter().any(|e| *e == commit.author_email)
            || self
                .skip_summaries
                .iter()
                .any(|m| commit.summary.contains(m.as_str()))
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

// ---------------------------------------------------------------------------
// BranchView
// ---------------------------------------------------------------------------

/// Filtered view of one branch's history.
#[derive(Clone, Debug)]
pub struct BranchView {
    /// The reference the view was loaded from (e.g. `origin/16.0`).
    pub refname: String,
    /// Change-sets, newest first, with exclusions applied.
    pub commits: Vec<Commit>,
}

impl BranchView {
    /// Load one view of a branch's history.
    ///
    /// `path` limits the walk to change-sets touching that subtree; `None`
    /// walks the whole branch. The sequence is loaded eagerly because
    /// correlation consumes it entirely and needs indexed access.
    ///
    /// # Errors
    /// Returns [`PortError`] if the log cannot be read or a record fails
    /// validation.
    pub fn load(
        repo: &GitRepo,
        refname: &str,
        path: Option<&str>,
        rules: &ExclusionRules,
    ) -> Result<Self, PortError> {
        let entries = repo.log(refname, path)?;
        let mut commits = Vec::with_capacity(entries.len());
        for entry in entries {
            let commit = Commit::from_log(entry)?;
            if rules.excludes(&commit) {
                continue;
            }
            commits.push(commit);
        }
        debug!(
            refname,
            path = path.unwrap_or("."),
            count = commits.len(),
            "loaded branch history"
        );
        Ok(Self {
            refname: refname.to_owned(),
            commits,
        })
    }

    /// Whether any change-set in this view matches `other` under `mode`.
    #[must_use]
    pub fn contains(&self, other: &Commit, mode: CompareMode) -> bool {
        self.commits.iter().any(|c| c.matches(other, mode))
    }

    /// Number of change-sets in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Whether the view holds no change-sets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
