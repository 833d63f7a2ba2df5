//! The `migrate` run.
//!
//! Moves a component that has never been ported to the target branch:
//! replay its whole source history onto a migration branch cut from the
//! target, run the repository's formatting hooks over the result, then a
//! port pass to catch change-sets the patch range carried only
//! partially. The operator finishes the job from the printed checklist.

use std::process::Command;

use fwport_git::{ApplyResult, GitRepo};
use fwport_github::Forge;
use tracing::{debug, warn};

use crate::config::FwportConfig;
use crate::correlate::Correlator;
use crate::error::PortError;
use crate::history::ExclusionRules;
use crate::port::{self, RunArgs};
use crate::preflight::{BranchRefs, Preflight};
use crate::prompt::Decider;
use crate::replay::{ReplayEngine, ReplayOptions};
use crate::store::DecisionStore;

/// Migrate `args.component` from the source branch to the target branch.
///
/// # Errors
/// [`PortError::PendingWork`] when invoked non-interactively,
/// [`PortError::ForkRequired`] without a fork remote,
/// [`PortError::NothingToMigrate`] when the patch range is empty, any
/// preflight failure, or a git/forge/store error from the stages.
pub fn run(
    repo: &GitRepo,
    forge: &dyn Forge,
    decider: &mut dyn Decider,
    config: &FwportConfig,
    args: &RunArgs<'_>,
) -> Result<(), PortError> {
    let store = DecisionStore::load(repo.root(), args.source, args.target, args.component)?;
    Migration {
        repo,
        forge,
        decider,
        store,
        config,
        args,
    }
    .run()
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

struct Migration<'a> {
    repo: &'a GitRepo,
    forge: &'a dyn Forge,
    decider: &'a mut dyn Decider,
    store: DecisionStore,
    config: &'a FwportConfig,
    args: &'a RunArgs<'a>,
}

impl Migration<'_> {
    fn run(mut self) -> Result<(), PortError> {
        if self.store.is_component_blacklisted() {
            println!("{} is blacklisted, skipping", self.args.component);
            return Ok(());
        }
        // Every stage is gated on answers; there is no unattended variant.
        if self.args.non_interactive {
            return Err(PortError::PendingWork { count: 1 });
        }
        if !self.confirm_migration()? {
            return Ok(());
        }

        let refs = Preflight::new(self.repo, self.args).for_migration()?;
        let fork = self.args.fork.ok_or_else(|| PortError::ForkRequired {
            owner: self.args.user_org.to_string(),
            repo: self.args.repo_name.to_string(),
        })?;

        self.repo.checkout(&refs.target_ref)?;
        let branch = format!("{}-mig-{}", self.args.target, self.args.component);
        let fresh = self.prepare_branch(&branch, &refs.target_ref)?;
        if fresh {
            if !self.replay_history(&refs)? {
                return Ok(());
            }
            self.run_formatting_hooks()?;
        }

        self.port_leftovers(&refs, &branch)?;
        self.print_checklist(fork, &branch);
        Ok(())
    }

    /// Gate the whole run. Declining offers the component blacklist.
    fn confirm_migration(&mut self) -> Result<bool, PortError> {
        let question = format!(
            "Migrate {} from {} to {}?",
            self.args.component, self.args.source, self.args.target
        );
        if self.decider.confirm(&question)? {
            return Ok(true);
        }
        if self
            .decider
            .confirm("Blacklist this component for future runs?")?
        {
            self.store.blacklist_component()?;
            println!("{} blacklisted", self.args.component);
        }
        Ok(false)
    }

    /// Cut (or reuse) the migration branch from the target head. Returns
    /// false when an existing branch is kept as-is; the history replay is
    /// skipped then and the port pass picks up where the previous run
    /// stopped.
    fn prepare_branch(&mut self, branch: &str, target_ref: &str) -> Result<bool, PortError> {
        if self.repo.branch_exists(branch)? {
            let question = format!("Branch {branch} already exists, recreate it?");
            if self.decider.confirm(&question)? {
                self.repo.delete_branch(branch)?;
                self.repo.create_branch(branch, target_ref)?;
            } else {
                self.repo.checkout(branch)?;
                return Ok(false);
            }
        } else {
            self.repo.create_branch(branch, target_ref)?;
        }
        Ok(true)
    }

    /// Replay the component's source history onto the migration branch.
    /// Returns false when the operator aborts on a conflict.
    fn replay_history(&mut self, refs: &BranchRefs) -> Result<bool, PortError> {
        let patch_dir = tempfile::tempdir()?;
        let patches = self.repo.format_patch_range(
            patch_dir.path(),
            &refs.target_ref,
            &refs.source_ref,
            self.args.component,
        )?;
        if patches.is_empty() {
            return Err(PortError::NothingToMigrate {
                component: self.args.component.to_string(),
                source: self.args.source.to_string(),
            });
        }
        println!(
            "Apply {} change-set(s) from {}",
            patches.len(),
            refs.source_ref
        );
        match self.repo.apply_patches(&patches)? {
            ApplyResult::Applied => Ok(true),
            ApplyResult::Failed { output } => {
                println!("{output}");
                let question = "A conflict occurred. Resolve it and finish with \
                                `git am --continue`, then continue? (declining aborts \
                                the migration)";
                if self.decider.confirm(question)? {
                    Ok(true)
                } else {
                    self.repo.abort_patch_session()?;
                    println!("Migration aborted");
                    Ok(false)
                }
            }
        }
    }

    /// Run the repository's pre-commit hooks over the tree, committing
    /// whatever they rewrite. Hook failures are expected on freshly
    /// replayed code and do not stop the migration.
    fn run_formatting_hooks(&self) -> Result<(), PortError> {
        if !self.repo.root().join(".pre-commit-config.yaml").exists() {
            return Ok(());
        }
        println!("Run pre-commit...");
        let status = Command::new("pre-commit")
            .args(["run", "-a"])
            .current_dir(self.repo.root())
            .status();
        match status {
            Ok(code) => debug!(success = code.success(), "pre-commit finished"),
            Err(err) => warn!(error = %err, "pre-commit unavailable, skipping"),
        }
        if !self.repo.is_clean()? {
            let message = format!("[IMP] {}: apply pre-commit formatting", self.args.component);
            self.repo.commit_all(&message, true)?;
        }
        Ok(())
    }

    /// Port pass over the migration branch. Change-sets whose patches the
    /// range replay restricted (multi-component commits) come through
    /// here grouped by pull request, applied in place without branch
    /// creation or publication.
    fn port_leftovers(&mut self, refs: &BranchRefs, branch: &str) -> Result<(), PortError> {
        let rules = ExclusionRules::from_config(&self.config.history);
        let pending = Correlator::new(
            self.repo,
            self.forge,
            &rules,
            &refs.source_ref,
            branch,
            self.args.component,
        )
        .pending()?;
        if pending.is_empty() {
            return Ok(());
        }
        let sub_refs = BranchRefs {
            source_ref: refs.source_ref.clone(),
            target_ref: branch.to_string(),
        };
        port::print_pending(&pending, self.args, &sub_refs);
        let opts = ReplayOptions {
            source: self.args.source,
            target: self.args.target,
            component: self.args.component,
            fork: self.args.fork,
            user_org: self.args.user_org,
            create_branch: false,
            push_branch: false,
        };
        let mut engine = ReplayEngine::new(
            self.repo,
            self.forge,
            &mut *self.decider,
            &mut self.store,
            &self.config.component,
            opts,
        );
        engine.run(&pending)?;
        Ok(())
    }

    fn print_checklist(&self, fork: &str, branch: &str) {
        println!(
            "Migration of {} is ready on {branch}. Remaining steps:",
            self.args.component
        );
        println!(
            "  - adapt {} to the {} series (manifest version, migration scripts)",
            self.args.component, self.args.target
        );
        println!("  - run the test suite");
        println!("  - push the branch:");
        println!("      git push {fork} {branch} --set-upstream");
        println!(
            "  - open a pull request titled \"[{}][MIG] {}\"",
            self.args.target, self.args.component
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
