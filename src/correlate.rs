//! Cross-branch correlation.
//!
//! Decides what is still missing downstream: walks the source branch's
//! component history, drops everything the target already has, resolves
//! each remaining change-set to its originating pull request via the forge
//! and fans out to the request's full change-set list. The result is the
//! pending map the replay engine consumes.
//!
//! Matching never looks at commit hashes. Replay rewrites them, so a
//! change-set already carried over is recognized structurally
//! ([`CompareMode::Strict`] against the whole target history) and a
//! partially carried one by its cleaned message ([`CompareMode::Loose`]),
//! with the matched change-set's paths recorded so the diff filter can
//! subtract them later.

use std::collections::{BTreeSet, HashSet};

use fwport_git::GitRepo;
use fwport_github::Forge;
use tracing::debug;

use crate::error::PortError;
use crate::history::{BranchView, ExclusionRules};
use crate::model::commit::{Commit, CompareMode};
use crate::model::unit::Unit;

// ---------------------------------------------------------------------------
// Pending map
// ---------------------------------------------------------------------------

/// One still-unported change-set, with the paths that earlier partial
/// ports already carried over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCommit {
    pub commit: Commit,
    /// Paths already on the target, accumulated from loose-matched
    /// target change-sets. The diff filter subtracts them.
    pub ported_paths: BTreeSet<String>,
}

/// One unit's pending work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUnit {
    pub unit: Unit,
    /// Top-level components touched by any of the unit's change-sets,
    /// including ones whose change-sets were all dropped.
    pub touched: BTreeSet<String>,
    /// Components covered by loose-matched target change-sets.
    pub ported: BTreeSet<String>,
    /// Change-sets still to replay, oldest first.
    pub commits: Vec<PendingCommit>,
}

impl PendingUnit {
    fn new(unit: Unit) -> Self {
        Self {
            unit,
            touched: BTreeSet::new(),
            ported: BTreeSet::new(),
            commits: Vec::new(),
        }
    }

    /// Components the unit touched that nothing on the target covers yet.
    #[must_use]
    pub fn components_not_ported(&self) -> BTreeSet<&str> {
        self.touched
            .iter()
            .filter(|c| !self.ported.contains(c.as_str()))
            .map(String::as_str)
            .collect()
    }

    fn push_commit(&mut self, commit: Commit, ported_paths: BTreeSet<String>) {
        // One insertion per low-level identifier.
        if self.commits.iter().any(|p| p.commit.sha == commit.sha) {
            return;
        }
        self.commits.push(PendingCommit {
            commit,
            ported_paths,
        });
    }
}

/// Units with pending change-sets, sorted by merge time ascending. The
/// orphan bucket has no merge time and sorts first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingMap {
    pub units: Vec<PendingUnit>,
}

impl PendingMap {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Real pull-request units.
    #[must_use]
    pub fn pull_request_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.unit.number().is_some())
            .count()
    }

    /// Change-sets in the orphan bucket.
    #[must_use]
    pub fn orphan_commit_count(&self) -> usize {
        self.units
            .iter()
            .find(|u| u.unit == Unit::Orphans)
            .map_or(0, |u| u.commits.len())
    }
}

// ---------------------------------------------------------------------------
// Correlator
// ---------------------------------------------------------------------------

/// Builds the pending map for one branch pair and component.
pub struct Correlator<'a> {
    repo: &'a GitRepo,
    forge: &'a dyn Forge,
    rules: &'a ExclusionRules,
    source_ref: &'a str,
    target_ref: &'a str,
    component: &'a str,
}

impl<'a> Correlator<'a> {
    #[must_use]
    pub fn new(
        repo: &'a GitRepo,
        forge: &'a dyn Forge,
        rules: &'a ExclusionRules,
        source_ref: &'a str,
        target_ref: &'a str,
        component: &'a str,
    ) -> Self {
        Self {
            repo,
            forge,
            rules,
            source_ref,
            target_ref,
            component,
        }
    }

    /// Correlate the two branches and return what remains to port.
    ///
    /// Rebuilt from scratch on every run; only the decision store carries
    /// state across invocations.
    ///
    /// # Errors
    /// Returns [`PortError`] on git or forge failures.
    pub fn pending(&self) -> Result<PendingMap, PortError> {
        let source_scoped = BranchView::load(
            self.repo,
            self.source_ref,
            Some(self.component),
            self.rules,
        )?;
        let target_full = BranchView::load(self.repo, self.target_ref, None, self.rules)?;
        let target_scoped = BranchView::load(
            self.repo,
            self.target_ref,
            Some(self.component),
            self.rules,
        )?;

        let mut units: Vec<PendingUnit> = Vec::new();
        let mut orphans = PendingUnit::new(Unit::Orphans);
        // Pull requests already fanned out this run.
        let mut resolved: HashSet<u64> = HashSet::new();

        // Oldest first so orphan change-sets replay in chronological order.
        for commit in source_scoped.commits.iter().rev() {
            if target_full.contains(commit, CompareMode::Strict) {
                continue;
            }
            match self.forge.pull_for_commit(commit.sha.as_str())? {
                Some(pr) => {
                    if !resolved.insert(pr.number) {
                        continue;
                    }
                    let unit = self.fan_out(
                        Unit::from_pull_request(&pr),
                        pr.number,
                        &target_full,
                        &target_scoped,
                    )?;
                    if !unit.commits.is_empty() {
                        units.push(unit);
                    }
                }
                None => {
                    for component in commit.components() {
                        orphans.touched.insert(component.to_owned());
                    }
                    orphans.push_commit(commit.clone(), BTreeSet::new());
                }
            }
        }

        if !orphans.commits.is_empty() {
            units.push(orphans);
        }
        units.sort_by(|a, b| a.unit.merged_at_key().cmp(b.unit.merged_at_key()));
        debug!(
            source = self.source_ref,
            target = self.target_ref,
            component = self.component,
            units = units.len(),
            "correlation finished"
        );
        Ok(PendingMap { units })
    }

    /// Process every change-set of one pull request, not just the ones that
    /// touched the component: the others may affect it indirectly or may
    /// already be fully carried over.
    fn fan_out(
        &self,
        unit: Unit,
        number: u64,
        target_full: &BranchView,
        target_scoped: &BranchView,
    ) -> Result<PendingUnit, PortError> {
        let mut pending = PendingUnit::new(unit);
        for sha in self.forge.pull_request_commit_shas(number)? {
            let Some(entry) = self.repo.find_commit(&sha)? else {
                // Unreachable pre-squash commit of the pull request.
                debug!(%sha, pr = number, "commit unknown locally, skipping");
                continue;
            };
            let commit = Commit::from_log(entry)?;
            for component in commit.components() {
                pending.touched.insert(component.to_owned());
            }
            if self.rules.excludes(&commit) {
                continue;
            }
            if target_scoped.contains(&commit, CompareMode::Loose) {
                // Already carried over within the component's own history.
                continue;
            }
            let (covered, ported_paths) = self.absorb_matches(&commit, target_full, &mut pending);
            if covered {
                continue;
            }
            pending.push_commit(commit, ported_paths);
        }
        Ok(pending)
    }

    /// Progressively consume target change-sets loose-matching `commit`,
    /// crediting their components to the unit and collecting their paths.
    /// Returns whether the accumulated credit covers every component the
    /// change-set touches.
    fn absorb_matches(
        &self,
        commit: &Commit,
        target_full: &BranchView,
        pending: &mut PendingUnit,
    ) -> (bool, BTreeSet<String>) {
        let mut pool = target_full.commits.clone();
        let mut ported_paths = BTreeSet::new();
        loop {
            let Some(index) = pool
                .iter()
                .position(|c| c.matches(commit, CompareMode::Loose))
            else {
                return (false, ported_paths);
            };
            let matched = pool.remove(index);
            for component in matched.components() {
                pending.ported.insert(component.to_owned());
            }
            ported_paths.extend(matched.paths.iter().cloned());
            if commit
                .components()
                .iter()
                .all(|c| pending.ported.contains(*c))
            {
                return (true, ported_paths);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
