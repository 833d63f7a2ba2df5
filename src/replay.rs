//! Unit replay.
//!
//! Consumes the pending map one unit at a time: a dedicated branch per
//! unit (optionally stacked on the previous unit's branch), `git
//! format-patch` piped into `git am -3` per change-set, then an offer to
//! push the branch and open a draft pull request against the target.
//! Every step that changes anything is gated on a [`Decider`] answer, and
//! each unit's path through the run is validated by a [`UnitProgress`]
//! machine.
//!
//! The engine never moves commits by hash. Each change-set is re-created
//! from a patch restricted to the paths the diff filter kept, so partial
//! earlier ports shrink the patch instead of conflicting with it.

use fwport_git::{ApplyResult, GitRepo};
use fwport_github::{Forge, NewPullRequest};

use crate::config::ComponentConfig;
use crate::correlate::{PendingCommit, PendingMap, PendingUnit};
use crate::eligibility::DiffFilter;
use crate::error::PortError;
use crate::model::unit::Unit;
use crate::prompt::Decider;
use crate::replay_state::{UnitPhase, UnitProgress};
use crate::store::DecisionStore;

// ---------------------------------------------------------------------------
// ReplayOptions
// ---------------------------------------------------------------------------

/// Settings distinguishing a direct port run from a migration sub-run.
#[derive(Clone, Copy, Debug)]
pub struct ReplayOptions<'a> {
    /// Source branch name (without the remote prefix).
    pub source: &'a str,
    /// Target branch name.
    pub target: &'a str,
    pub component: &'a str,
    /// Remote that replay branches are pushed to, when one is configured.
    pub fork: Option<&'a str>,
    /// Owner prefix of the pull-request head (`{user_org}:{branch}`).
    pub user_org: &'a str,
    /// Create one branch per unit. A migration applies every unit onto
    /// the branch that is already checked out instead.
    pub create_branch: bool,
    /// Offer to push branches and open pull requests.
    pub push_branch: bool,
}

/// How one unit's processing ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The unit is blacklisted in the decision store; nothing was asked.
    Blacklisted,
    /// The operator declined porting the unit.
    Declined,
    /// The unit ran to a terminal phase.
    Finished(UnitPhase),
}

/// Publication bookkeeping across units: the last branch that received
/// work, and the units accumulated on it through chained bases.
struct Chain {
    previous: Option<(Unit, String)>,
    accumulated: Vec<Unit>,
}

// ---------------------------------------------------------------------------
// ReplayEngine
// ---------------------------------------------------------------------------

/// Replays pending units onto the target branch.
pub struct ReplayEngine<'a> {
    repo: &'a GitRepo,
    forge: &'a dyn Forge,
    decider: &'a mut dyn Decider,
    store: &'a mut DecisionStore,
    component: &'a ComponentConfig,
    opts: ReplayOptions<'a>,
}

impl<'a> ReplayEngine<'a> {
    #[must_use]
    pub fn new(
        repo: &'a GitRepo,
        forge: &'a dyn Forge,
        decider: &'a mut dyn Decider,
        store: &'a mut DecisionStore,
        component: &'a ComponentConfig,
        opts: ReplayOptions<'a>,
    ) -> Self {
        Self {
            repo,
            forge,
            decider,
            store,
            component,
            opts,
        }
    }

    /// Process every unit of the pending map, oldest first.
    ///
    /// HEAD must sit on the branch the replay bases its work on (the
    /// local target branch for a port, the migration branch for a
    /// migration); its commit is the fixed baseline for no-op detection.
    ///
    /// # Errors
    /// Returns [`PortError`] when git or the forge fails, or when the
    /// decision store cannot be persisted. Declined units and apply
    /// conflicts are not errors.
    pub fn run(&mut self, pending: &PendingMap) -> Result<Vec<UnitOutcome>, PortError> {
        let base_head = self.repo.head_sha()?;
        let mut chain = Chain {
            previous: None,
            accumulated: Vec::new(),
        };
        let mut outcomes = Vec::with_capacity(pending.units.len());
        for unit in &pending.units {
            outcomes.push(self.process_unit(unit, &base_head, &mut chain)?);
        }
        if !pending.units.is_empty() {
            println!("Last PR processed!");
        }
        Ok(outcomes)
    }

    fn process_unit(
        &mut self,
        pending: &PendingUnit,
        base_head: &str,
        chain: &mut Chain,
    ) -> Result<UnitOutcome, PortError> {
        let reference = pending.unit.reference();
        if self.store.is_unit_blacklisted(&reference) {
            println!("{reference} is blacklisted, skipping");
            return Ok(UnitOutcome::Blacklisted);
        }
        match &pending.unit {
            Unit::PullRequest { number, url, .. } => println!("Port PR #{number} ({url})"),
            Unit::Orphans => println!("Port commits w/o PR"),
        }
        let question = if pending.unit.number().is_some() {
            "Port it?"
        } else {
            "Port them?"
        };
        if !self.decider.confirm(question)? {
            self.offer_blacklist(&pending.unit)?;
            return Ok(UnitOutcome::Declined);
        }
        let phase = self.port_unit(pending, base_head, chain)?;
        Ok(UnitOutcome::Finished(phase))
    }

    /// Declined units can be remembered so later runs stop proposing them.
    fn offer_blacklist(&mut self, unit: &Unit) -> Result<(), PortError> {
        let question = if unit.number().is_some() {
            "Blacklist this pull request for future runs?"
        } else {
            "Blacklist these commits for future runs?"
        };
        if self.decider.confirm(question)? {
            let reference = unit.reference();
            self.store.blacklist_unit(&reference)?;
            println!("{reference} blacklisted");
        }
        Ok(())
    }

    fn port_unit(
        &mut self,
        pending: &PendingUnit,
        base_head: &str,
        chain: &mut Chain,
    ) -> Result<UnitPhase, PortError> {
        let mut progress = UnitProgress::new();
        let mut based_on_previous = false;

        let mut base = base_head.to_string();
        if self.opts.create_branch {
            if let Some((prev_unit, prev_branch)) = &chain.previous {
                if let Some(number) = prev_unit.number() {
                    let question = format!("Use the previous PR #{number} branch as base?");
                    if self.decider.confirm(&question)? {
                        base = prev_branch.clone();
                        based_on_previous = true;
                    }
                }
            }
        }

        let prev_branch = chain.previous.as_ref().map(|(_, b)| b.as_str());
        let (branch, apply) =
            self.position_on_branch(&pending.unit, &base, prev_branch, &mut based_on_previous)?;
        progress.advance(UnitPhase::BranchReady)?;
        if apply {
            for item in &pending.commits {
                self.apply_commit(item, &mut progress)?;
            }
        }
        progress.advance(UnitPhase::UnitComplete)?;

        if self.repo.head_sha()? == base_head {
            println!("Nothing has been ported, skipping");
            progress.advance(UnitPhase::NoOp)?;
            return Ok(UnitPhase::NoOp);
        }

        if based_on_previous {
            chain.accumulated.push(pending.unit.clone());
        } else {
            chain.accumulated = vec![pending.unit.clone()];
        }
        chain.previous = Some((pending.unit.clone(), branch.clone()));

        self.publish_unit(&branch, chain, &mut progress)
    }

    /// Put HEAD where the unit's change-sets should land.
    ///
    /// Returns the branch name and whether change-sets should be applied;
    /// a reused branch keeps whatever a previous run put on it.
    fn position_on_branch(
        &mut self,
        unit: &Unit,
        base: &str,
        prev_branch: Option<&str>,
        based_on_previous: &mut bool,
    ) -> Result<(String, bool), PortError> {
        let name = unit.branch_name(self.opts.source, self.opts.target);
        if !self.opts.create_branch {
            // Migration sub-run: everything lands on the current branch.
            return Ok((name, true));
        }
        if self.repo.branch_exists(&name)? {
            if let Some(prev) = prev_branch {
                if self.repo.is_ancestor(prev, &name)? {
                    *based_on_previous = true;
                }
            }
            let question = format!("Branch {name} already exists, recreate it?");
            if !self.decider.confirm(&question)? {
                self.repo.checkout(&name)?;
                return Ok((name, false));
            }
            self.repo.checkout(base)?;
            self.repo.delete_branch(&name)?;
        }
        self.repo.create_branch(&name, base)?;
        Ok((name, true))
    }

    /// Re-create one change-set on HEAD from a path-restricted patch.
    fn apply_commit(
        &mut self,
        item: &PendingCommit,
        progress: &mut UnitProgress,
    ) -> Result<(), PortError> {
        let commit = &item.commit;
        println!("  Apply {} {}", commit.sha.short(), commit.summary);
        let diffs = self.repo.diff_entries(commit.sha.as_str())?;
        let filter = DiffFilter::new(self.repo.root(), self.component);
        let outcome = filter.commit_paths(&diffs, &item.ported_paths);
        for advisory in &outcome.advisories {
            println!("  {advisory}");
        }
        if outcome.paths.is_empty() {
            println!("  Nothing to port from this commit, skipping");
            progress.advance(UnitPhase::CommitSkipped)?;
            return Ok(());
        }
        let paths: Vec<String> = outcome.paths.into_iter().collect();
        let patch_dir = tempfile::tempdir()?;
        let patches = self
            .repo
            .format_patch(patch_dir.path(), commit.sha.as_str(), &paths)?;
        if patches.is_empty() {
            // The path restriction can empty the patch entirely.
            println!("  Nothing to port from this commit, skipping");
            progress.advance(UnitPhase::CommitSkipped)?;
            return Ok(());
        }
        match self.repo.apply_patches(&patches)? {
            ApplyResult::Applied => progress.advance(UnitPhase::CommitApplied)?,
            ApplyResult::Failed { output } => self.resolve_conflict(&output, progress)?,
        }
        Ok(())
    }

    /// The open `am` session either gets finished by the operator or is
    /// aborted, dropping just this change-set.
    fn resolve_conflict(
        &mut self,
        output: &str,
        progress: &mut UnitProgress,
    ) -> Result<(), PortError> {
        progress.advance(UnitPhase::CommitConflict)?;
        println!("{output}");
        let question = "A conflict occurred. Resolve it and finish with `git am --continue`, \
                        then continue? (declining skips this commit)";
        if self.decider.confirm(question)? {
            progress.advance(UnitPhase::CommitApplied)?;
        } else {
            self.repo.abort_patch_session()?;
            println!("  Commit skipped");
            progress.advance(UnitPhase::CommitSkipped)?;
        }
        Ok(())
    }

    fn publish_unit(
        &mut self,
        branch: &str,
        chain: &Chain,
        progress: &mut UnitProgress,
    ) -> Result<UnitPhase, PortError> {
        if !self.opts.push_branch {
            return Self::skip_publish(progress);
        }
        let Some(fork) = self.opts.fork else {
            return Self::skip_publish(progress);
        };
        if !self.decider.confirm(&format!("Push branch {branch} to {fork}?"))? {
            return Self::skip_publish(progress);
        }
        self.repo.push_force_with_lease(fork, branch)?;
        progress.advance(UnitPhase::Pushed)?;

        let payload = publication_payload(
            &chain.accumulated,
            self.opts.source,
            self.opts.target,
            self.opts.component,
            self.opts.user_org,
            branch,
        );
        if let Some(url) = self
            .forge
            .search_open_pull_request(self.opts.target, &payload.title)?
        {
            println!("Existing PR has been refreshed => {url}");
            progress.advance(UnitPhase::PrRefreshed)?;
            return Ok(UnitPhase::PrRefreshed);
        }
        if self.decider.confirm("Create the PR?")? {
            let url = self.forge.create_pull_request(&payload)?;
            println!("PR created => {url}");
            progress.advance(UnitPhase::PrCreated)?;
            Ok(UnitPhase::PrCreated)
        } else {
            Self::skip_publish(progress)
        }
    }

    fn skip_publish(progress: &mut UnitProgress) -> Result<UnitPhase, PortError> {
        progress.advance(UnitPhase::PublishSkipped)?;
        Ok(UnitPhase::PublishSkipped)
    }
}

// ---------------------------------------------------------------------------
// Pull-request payload
// ---------------------------------------------------------------------------

/// Build the draft pull-request payload for the units carried by one
/// branch.
///
/// A single ported pull request keeps its original title; anything else
/// (several chained requests, or the orphan bucket) gets a combined title
/// and a body listing the request numbers.
#[must_use]
pub fn publication_payload(
    units: &[Unit],
    source: &str,
    target: &str,
    component: &str,
    user_org: &str,
    branch: &str,
) -> NewPullRequest {
    let (title, body) = if let [Unit::PullRequest { number, title, .. }] = units {
        (
            format!("[{target}][FW] {title}"),
            format!("Port of #{number} from {source} to {target}."),
        )
    } else {
        let mut body = format!("Port of the following pull requests from {source} to {target}:");
        for number in units.iter().filter_map(Unit::number) {
            body.push_str(&format!("\n- #{number}"));
        }
        (
            format!("[{target}][FW] {component}: multiple ports from {source}"),
            body,
        )
    };
    NewPullRequest {
        title,
        body,
        head: format!("{user_org}:{branch}"),
        base: target.to_string(),
        draft: true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
