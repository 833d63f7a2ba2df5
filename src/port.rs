//! The `port` run.
//!
//! Ties the stages together for a component that already lives on the
//! target branch: preflight the repository, correlate the two branch
//! histories into a pending map, report it, then replay it unit by unit
//! onto a local target branch. Reporting always happens; replay needs an
//! interactive session and a fork remote to push to.

use fwport_git::GitRepo;
use fwport_github::Forge;

use crate::config::FwportConfig;
use crate::correlate::{Correlator, PendingMap};
use crate::error::PortError;
use crate::history::ExclusionRules;
use crate::model::unit::Unit;
use crate::preflight::{BranchRefs, Preflight};
use crate::prompt::Decider;
use crate::replay::{ReplayEngine, ReplayOptions};
use crate::store::DecisionStore;

// ---------------------------------------------------------------------------
// RunArgs
// ---------------------------------------------------------------------------

/// Inputs of one run, resolved by the CLI layer.
#[derive(Clone, Copy, Debug)]
pub struct RunArgs<'a> {
    /// Source branch name, without the remote prefix.
    pub source: &'a str,
    /// Target branch name.
    pub target: &'a str,
    pub component: &'a str,
    /// Remote the branch pair is read from.
    pub upstream: &'a str,
    /// Remote that receives ported branches, when one is configured.
    pub fork: Option<&'a str>,
    /// Forge account owning the fork.
    pub user_org: &'a str,
    /// Upstream repository name, used in remediation hints.
    pub repo_name: &'a str,
    pub verbose: bool,
    pub non_interactive: bool,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Port pending units of `args.component` from the source branch to the
/// target branch.
///
/// The pending map is always reported. An interactive run with a fork
/// remote then replays it; without a fork the run stops after the report.
///
/// # Errors
/// [`PortError::PendingWork`] when units are pending in a
/// non-interactive run, any preflight failure, or a git/forge/store
/// error from correlation or replay.
pub fn run(
    repo: &GitRepo,
    forge: &dyn Forge,
    decider: &mut dyn Decider,
    config: &FwportConfig,
    args: &RunArgs<'_>,
) -> Result<(), PortError> {
    let mut store = DecisionStore::load(repo.root(), args.source, args.target, args.component)?;
    if store.is_component_blacklisted() {
        println!("{} is blacklisted, skipping", args.component);
        return Ok(());
    }

    let refs = Preflight::new(repo, args).for_port()?;

    let rules = ExclusionRules::from_config(&config.history);
    let pending = Correlator::new(
        repo,
        forge,
        &rules,
        &refs.source_ref,
        &refs.target_ref,
        args.component,
    )
    .pending()?;

    if pending.is_empty() {
        println!(
            "Nothing to port from {} to {}",
            refs.source_ref, refs.target_ref
        );
        return Ok(());
    }
    print_pending(&pending, args, &refs);

    if args.non_interactive {
        return Err(PortError::PendingWork {
            count: pending.units.len(),
        });
    }
    let Some(fork) = args.fork else {
        println!("No fork remote given, reporting only (pass --fork to port)");
        return Ok(());
    };

    // Replay bases its branches on a local target head.
    if repo.branch_exists(args.target)? {
        repo.checkout(args.target)?;
    } else {
        repo.create_branch(args.target, &refs.target_ref)?;
    }

    let opts = ReplayOptions {
        source: args.source,
        target: args.target,
        component: args.component,
        fork: Some(fork),
        user_org: args.user_org,
        create_branch: true,
        push_branch: true,
    };
    let mut engine = ReplayEngine::new(repo, forge, decider, &mut store, &config.component, opts);
    engine.run(&pending)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Print the pending map: a summary line, then a block per unit, then
/// the unit's change-sets when `--verbose` (always for the orphan
/// bucket, which has nothing else to show).
pub(crate) fn print_pending(pending: &PendingMap, args: &RunArgs<'_>, refs: &BranchRefs) {
    let pr_count = pending.pull_request_count();
    let orphan_count = pending.orphan_commit_count();
    let mut summary = format!("{pr_count} pull request(s)");
    if orphan_count > 0 {
        summary.push_str(&format!(" and {orphan_count} commit(s) w/o PR"));
    }
    println!(
        "{summary} related to '{}' to port from {} to {}",
        args.component, refs.source_ref, refs.target_ref
    );

    for (index, entry) in pending.units.iter().enumerate() {
        let position = index + 1;
        match &entry.unit {
            Unit::PullRequest {
                number,
                title,
                author,
                merged_at,
                ..
            } => {
                println!("{position}) PR #{number} {title}:");
                println!("  By {author}, merged at {merged_at}");
            }
            Unit::Orphans => println!("{position}) commits without a pull request:"),
        }
        let missing = entry.components_not_ported();
        if !missing.is_empty() {
            let list = missing.into_iter().collect::<Vec<_>>().join(", ");
            println!("  => Not ported: {list}");
        }
        println!("  => {} commit(s) not (fully) ported", entry.commits.len());
        if args.verbose || entry.unit.number().is_none() {
            for item in &entry.commits {
                println!("  {} {}", item.commit.sha.short(), item.commit.summary);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
