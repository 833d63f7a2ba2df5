//! Per-change-set diff eligibility.
//!
//! Before a change-set is replayed, each of its file-level diffs is vetted
//! against the target working tree: packaging scaffolding, translation
//! catalogs, paths already ported by earlier runs, diffs into components
//! absent downstream and edits to files that no longer exist are all
//! dropped. What survives decides the paths the generated patch is
//! restricted to; an empty survivor set means the change-set is skipped
//! outright.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use fwport_git::{DiffEntry, DiffStatus};
use regex::Regex;

use crate::config::ComponentConfig;
use crate::model::commit::top_level;

/// Top-level prefix of packaging scaffolding, never ported.
pub const PACKAGING_PREFIX: &str = "setup";

/// Translation catalogs (`.po`/`.pot` files under an `i18n/` directory).
static CATALOG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*i18n/.+\.pot?$").expect("catalog pattern compiles"));

// ---------------------------------------------------------------------------
// DiffFilter
// ---------------------------------------------------------------------------

/// Outcome of filtering one change-set's diffs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Paths the patch is restricted to. Empty means nothing left to port.
    pub paths: BTreeSet<String>,
    /// Operator-facing skip notices, in diff order.
    pub advisories: Vec<String>,
}

enum Verdict {
    Keep,
    Silent,
    Notice(String),
}

/// Vets file-level diffs against one working tree.
pub struct DiffFilter<'a> {
    worktree: &'a Path,
    manifest_files: &'a [String],
}

impl<'a> DiffFilter<'a> {
    #[must_use]
    pub fn new(worktree: &'a Path, component: &'a ComponentConfig) -> Self {
        Self {
            worktree,
            manifest_files: &component.manifest_files,
        }
    }

    /// Decide which of a change-set's paths are still portable.
    ///
    /// `ported` holds the paths earlier runs already carried over (from the
    /// correlation side-table); they are subtracted before any per-diff
    /// rule runs.
    #[must_use]
    pub fn commit_paths(
        &self,
        diffs: &[DiffEntry],
        ported: &BTreeSet<String>,
    ) -> FilterOutcome {
        let residual = residual_paths(diffs, ported);
        let created = self.created_components(diffs);
        let mut paths = residual.clone();
        let mut advisories = Vec::new();
        for diff in diffs {
            match self.verdict(diff, &residual, &created) {
                Verdict::Keep => {}
                Verdict::Silent => {
                    paths.remove(&diff.a_path);
                    paths.remove(&diff.b_path);
                }
                Verdict::Notice(text) => {
                    advisories.push(text);
                    paths.remove(&diff.a_path);
                    paths.remove(&diff.b_path);
                }
            }
        }
        FilterOutcome { paths, advisories }
    }

    fn verdict(
        &self,
        diff: &DiffEntry,
        residual: &BTreeSet<String>,
        created: &BTreeSet<String>,
    ) -> Verdict {
        // Already ported or filtered outright.
        if diff.status == DiffStatus::Deleted {
            if !residual.contains(&diff.a_path) {
                return Verdict::Silent;
            }
        } else if !residual.contains(&diff.b_path) {
            return Verdict::Silent;
        }
        // Renames travel whole; the component rule would misread them.
        if diff.status == DiffStatus::Renamed {
            return Verdict::Keep;
        }
        let component = top_level(&diff.b_path);
        if !self.has_manifest(component) && !created.contains(component) {
            return Verdict::Notice(format!(
                "SKIP diff {} {}: relates to an unported component",
                diff.status.letter(),
                diff.b_path
            ));
        }
        if matches!(diff.status, DiffStatus::Modified | DiffStatus::Deleted)
            && !self.worktree.join(&diff.b_path).exists()
        {
            return Verdict::Notice(format!(
                "SKIP: '{} {}' diff relates to a non-existing file",
                diff.status.letter(),
                diff.b_path
            ));
        }
        Verdict::Keep
    }

    /// Top-level directories whose manifest this very change-set adds.
    /// Diffs into those are eligible even though the manifest is not on
    /// disk yet.
    fn created_components(&self, diffs: &[DiffEntry]) -> BTreeSet<String> {
        diffs
            .iter()
            .filter(|d| d.status == DiffStatus::Added)
            .filter(|d| self.manifest_files.iter().any(|m| d.b_path.contains(m.as_str())))
            .map(|d| top_level(&d.b_path).to_owned())
            .collect()
    }

    fn has_manifest(&self, component: &str) -> bool {
        self.manifest_files
            .iter()
            .any(|m| self.worktree.join(component).join(m).exists())
    }
}

/// Whether a path is portable at all.
#[must_use]
pub fn keep_path(path: &str) -> bool {
    !path.starts_with(PACKAGING_PREFIX) && !CATALOG_PATTERN.is_match(path)
}

/// Own paths of a change-set's diffs that survive the path filter, minus
/// the paths earlier runs already ported.
#[must_use]
pub fn residual_paths(diffs: &[DiffEntry], ported: &BTreeSet<String>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for diff in diffs {
        if keep_path(&diff.a_path) {
            out.insert(diff.a_path.clone());
        }
        if keep_path(&diff.b_path) {
            out.insert(diff.b_path.clone());
        }
    }
    for path in ported {
        out.remove(path);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
