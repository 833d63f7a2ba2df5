//! Porting units.
//!
//! A [`Unit`] is the grouping key of the pending map: one merged pull
//! request, or the synthetic bucket for commits that reached the source
//! branch without one. Units are hashable by their immutable identifying
//! attributes so they can key a mapping; mutable porting bookkeeping lives
//! on the pending map, not here.

use std::fmt;

use fwport_github::PullRequestData;

/// Stable reference for the orphan bucket in the decision store.
pub const ORPHAN_REF: &str = "orphaned-commits";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    /// A merged upstream pull request.
    PullRequest {
        number: u64,
        url: String,
        /// Author login on the forge.
        author: String,
        title: String,
        body: String,
        /// Merge timestamp as returned by the forge (ISO-8601 UTC).
        /// Lexicographic order is chronological order.
        merged_at: String,
    },
    /// Commits with no originating pull request.
    Orphans,
}

impl Unit {
    #[must_use]
    pub fn from_pull_request(data: &PullRequestData) -> Self {
        Self::PullRequest {
            number: data.number,
            url: data.html_url.clone(),
            author: data.user.login.clone(),
            title: data.title.clone(),
            body: data.body.clone().unwrap_or_default(),
            merged_at: data.merged_at.clone().unwrap_or_default(),
        }
    }

    /// Reference string used as the decision-store key.
    #[must_use]
    pub fn reference(&self) -> String {
        match self {
            Self::PullRequest { number, .. } => format!("#{number}"),
            Self::Orphans => ORPHAN_REF.to_string(),
        }
    }

    /// Deterministic replay branch name for this unit and branch pair.
    #[must_use]
    pub fn branch_name(&self, source: &str, target: &str) -> String {
        match self {
            Self::PullRequest { number, .. } => {
                format!("fwport-pr-{number}-from-{source}-to-{target}")
            }
            Self::Orphans => format!("fwport-orphans-from-{source}-to-{target}"),
        }
    }

    /// Sort key for merge-time ordering. The orphan bucket sorts first.
    #[must_use]
    pub fn merged_at_key(&self) -> &str {
        match self {
            Self::PullRequest { merged_at, .. } => merged_at,
            Self::Orphans => "",
        }
    }

    #[must_use]
    pub const fn number(&self) -> Option<u64> {
        match self {
            Self::PullRequest { number, .. } => Some(*number),
            Self::Orphans => None,
        }
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::PullRequest { title, .. } => Some(title),
            Self::Orphans => None,
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::PullRequest { url, .. } => Some(url),
            Self::Orphans => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PullRequest {
                number,
                author,
                title,
                merged_at,
                ..
            } => {
                write!(f, "PR #{number} ({title}) by {author}")?;
                if merged_at.is_empty() {
                    Ok(())
                } else {
                    write!(f, ", merged {merged_at}")
                }
            }
            Self::Orphans => write!(f, "commits without a pull request"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
