//! Run preflight.
//!
//! Everything verified before any porting work touches the working tree:
//! tree cleanliness, remote wiring, branch resolution, and whether the
//! component sits where the requested operation expects it. The outcome
//! is the pair of committish references the rest of the run reads from.

use fwport_git::GitRepo;
use tracing::{debug, warn};

use crate::error::PortError;
use crate::port::RunArgs;

// ---------------------------------------------------------------------------
// BranchRefs
// ---------------------------------------------------------------------------

/// Resolved references for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchRefs {
    /// Source committish, always remote-qualified (`{upstream}/{source}`).
    pub source_ref: String,
    /// Target committish: `{upstream}/{target}`, or a local `{target}`
    /// head when the remote branch does not exist yet.
    pub target_ref: String,
}

// ---------------------------------------------------------------------------
// Preflight
// ---------------------------------------------------------------------------

/// Checks shared by `port` and `migrate`, plus the dispatch rule that
/// tells the two operations apart.
pub struct Preflight<'a> {
    repo: &'a GitRepo,
    args: &'a RunArgs<'a>,
}

impl<'a> Preflight<'a> {
    #[must_use]
    pub const fn new(repo: &'a GitRepo, args: &'a RunArgs<'a>) -> Self {
        Self { repo, args }
    }

    /// Preflight for porting into an existing component.
    ///
    /// # Errors
    /// Any common check failing (see [`Self::for_migration`]), or
    /// [`PortError::ComponentNotOnTarget`] when the component has never
    /// been migrated to the target branch.
    pub fn for_port(&self) -> Result<BranchRefs, PortError> {
        let refs = self.common()?;
        if !self.component_on(&refs.target_ref)? {
            return Err(PortError::ComponentNotOnTarget {
                component: self.args.component.to_string(),
                target: self.args.target.to_string(),
            });
        }
        Ok(refs)
    }

    /// Preflight for migrating a component absent downstream.
    ///
    /// # Errors
    /// [`PortError::DirtyWorkTree`], [`PortError::RemoteMissing`],
    /// [`PortError::BranchNotFound`], or
    /// [`PortError::ComponentMissingOnSource`] from the common checks;
    /// [`PortError::ForkRequired`], [`PortError::UntrackedFiles`], or
    /// [`PortError::ComponentAlreadyPresent`] from the migration rules.
    pub fn for_migration(&self) -> Result<BranchRefs, PortError> {
        let refs = self.common()?;
        if self.args.fork.is_none() {
            return Err(PortError::ForkRequired {
                owner: self.args.user_org.to_string(),
                repo: self.args.repo_name.to_string(),
            });
        }
        let untracked = self.repo.untracked_files()?;
        if !untracked.is_empty() {
            return Err(PortError::UntrackedFiles { files: untracked });
        }
        if self.component_on(&refs.target_ref)? {
            return Err(PortError::ComponentAlreadyPresent {
                component: self.args.component.to_string(),
                target: self.args.target.to_string(),
            });
        }
        Ok(refs)
    }

    fn common(&self) -> Result<BranchRefs, PortError> {
        if !self.repo.is_clean()? {
            return Err(PortError::DirtyWorkTree);
        }

        let remotes = self.repo.remotes()?;
        if !remotes.iter().any(|r| r == self.args.upstream) {
            return Err(PortError::RemoteMissing {
                remote: self.args.upstream.to_string(),
                purpose: "upstream".to_string(),
                url_hint: "<url>".to_string(),
            });
        }
        if let Some(fork) = self.args.fork {
            if !remotes.iter().any(|r| r == fork) {
                return Err(PortError::RemoteMissing {
                    remote: fork.to_string(),
                    purpose: "fork".to_string(),
                    url_hint: format!(
                        "git@github.com:{}/{}.git",
                        self.args.user_org, self.args.repo_name
                    ),
                });
            }
        }

        self.repo
            .fetch(self.args.upstream, self.args.source)
            .map_err(|err| {
                warn!(error = %err, "source fetch failed");
                PortError::BranchNotFound {
                    branch: self.args.source.to_string(),
                    remote: self.args.upstream.to_string(),
                }
            })?;
        // A stale or missing remote target is fine if a local head can
        // stand in.
        if let Err(err) = self.repo.fetch(self.args.upstream, self.args.target) {
            debug!(error = %err, "target fetch failed, trying local heads");
        }

        let source_ref = format!("{}/{}", self.args.upstream, self.args.source);
        if !self.repo.ref_exists(&source_ref)? {
            return Err(PortError::BranchNotFound {
                branch: self.args.source.to_string(),
                remote: self.args.upstream.to_string(),
            });
        }
        let remote_target = format!("{}/{}", self.args.upstream, self.args.target);
        let target_ref = if self.repo.ref_exists(&remote_target)? {
            remote_target
        } else if self.repo.branch_exists(self.args.target)? {
            debug!(target = self.args.target, "using the local target head");
            self.args.target.to_string()
        } else {
            return Err(PortError::BranchNotFound {
                branch: self.args.target.to_string(),
                remote: self.args.upstream.to_string(),
            });
        };

        if !self.component_on(&source_ref)? {
            return Err(PortError::ComponentMissingOnSource {
                component: self.args.component.to_string(),
                source: self.args.source.to_string(),
            });
        }

        Ok(BranchRefs {
            source_ref,
            target_ref,
        })
    }

    fn component_on(&self, refname: &str) -> Result<bool, PortError> {
        let dirs = self.repo.top_level_dirs(refname)?;
        Ok(dirs.iter().any(|d| d == self.args.component))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::process::Command;

    use super::*;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn commit_file(dir: &Path, file: &str, content: &str, message: &str) {
        let path = dir.join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        git(dir, &["add", "-A"]);
        git(dir, &["commit", "--quiet", "-m", message]);
    }

    /// Upstream with `gadget` on both branches and `widget` only on
    /// `16.0`, plus a clone of it (remote `origin`) to run preflight in.
    fn scenario() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let upstream = tmp.path().join("upstream");
        std::fs::create_dir(&upstream).unwrap();
        git(&upstream, &["init", "--quiet", "-b", "16.0"]);
        git(&upstream, &["config", "user.name", "Alice"]);
        git(&upstream, &["config", "user.email", "alice@example.com"]);
        commit_file(&upstream, "gadget/__manifest__.py", "{}", "[ADD] gadget");
        git(&upstream, &["branch", "17.0"]);
        commit_file(&upstream, "widget/__manifest__.py", "{}", "[ADD] widget");
        commit_file(&upstream, "widget/models.py", "base\n", "[ADD] widget: models");

        let work = tmp.path().join("work");
        git(
            tmp.path(),
            &["clone", "--quiet", upstream.to_str().unwrap(), "work"],
        );
        git(&work, &["config", "user.name", "Alice"]);
        git(&work, &["config", "user.email", "alice@example.com"]);
        (tmp, work)
    }

    fn args<'a>(
        source: &'a str,
        target: &'a str,
        component: &'a str,
        fork: Option<&'a str>,
    ) -> RunArgs<'a> {
        RunArgs {
            source,
            target,
            component,
            upstream: "origin",
            fork,
            user_org: "me",
            repo_name: "repo",
            verbose: false,
            non_interactive: false,
        }
    }

    #[test]
    fn port_preflight_resolves_remote_refs() {
        let (_tmp, work) = scenario();
        let repo = GitRepo::open(&work);
        let run = args("16.0", "17.0", "gadget", None);
        let refs = Preflight::new(&repo, &run).for_port().unwrap();
        assert_eq!(refs.source_ref, "origin/16.0");
        assert_eq!(refs.target_ref, "origin/17.0");
    }

    #[test]
    fn dirty_tree_aborts() {
        let (_tmp, work) = scenario();
        std::fs::write(work.join("gadget/__manifest__.py"), "changed").unwrap();
        let repo = GitRepo::open(&work);
        let run = args("16.0", "17.0", "gadget", None);
        let err = Preflight::new(&repo, &run).for_port().unwrap_err();
        assert!(matches!(err, PortError::DirtyWorkTree));
    }

    #[test]
    fn missing_upstream_remote_is_reported() {
        let (_tmp, work) = scenario();
        let repo = GitRepo::open(&work);
        let mut run = args("16.0", "17.0", "gadget", None);
        run.upstream = "up";
        let err = Preflight::new(&repo, &run).for_port().unwrap_err();
        assert!(matches!(
            err,
            PortError::RemoteMissing { ref remote, .. } if remote == "up"
        ));
    }

    #[test]
    fn missing_fork_remote_suggests_the_add_command() {
        let (_tmp, work) = scenario();
        let repo = GitRepo::open(&work);
        let run = args("16.0", "17.0", "gadget", Some("fork"));
        let err = Preflight::new(&repo, &run).for_port().unwrap_err();
        match err {
            PortError::RemoteMissing {
                remote,
                purpose,
                url_hint,
            } => {
                assert_eq!(remote, "fork");
                assert_eq!(purpose, "fork");
                assert_eq!(url_hint, "git@github.com:me/repo.git");
            }
            other => panic!("expected RemoteMissing, got {other:?}"),
        }
    }

    #[test]
    fn unknown_source_branch_is_fatal() {
        let (_tmp, work) = scenario();
        let repo = GitRepo::open(&work);
        let run = args("99.0", "17.0", "gadget", None);
        let err = Preflight::new(&repo, &run).for_port().unwrap_err();
        assert!(matches!(
            err,
            PortError::BranchNotFound { ref branch, .. } if branch == "99.0"
        ));
    }

    #[test]
    fn local_target_head_stands_in_for_a_missing_remote_branch() {
        let (_tmp, work) = scenario();
        git(&work, &["branch", "18.0"]);
        let repo = GitRepo::open(&work);
        let run = args("16.0", "18.0", "widget", None);
        let refs = Preflight::new(&repo, &run).for_port().unwrap();
        assert_eq!(refs.target_ref, "18.0");
    }

    #[test]
    fn missing_component_on_source_is_fatal() {
        let (_tmp, work) = scenario();
        let repo = GitRepo::open(&work);
        let run = args("16.0", "17.0", "nonexistent", None);
        let err = Preflight::new(&repo, &run).for_port().unwrap_err();
        assert!(matches!(err, PortError::ComponentMissingOnSource { .. }));
    }

    #[test]
    fn port_requires_the_component_on_the_target() {
        let (_tmp, work) = scenario();
        let repo = GitRepo::open(&work);
        let run = args("16.0", "17.0", "widget", None);
        let err = Preflight::new(&repo, &run).for_port().unwrap_err();
        assert!(matches!(err, PortError::ComponentNotOnTarget { .. }));
    }

    #[test]
    fn migration_requires_the_component_absent_on_the_target() {
        let (tmp, work) = scenario();
        let upstream = tmp.path().join("upstream");
        git(&work, &["remote", "add", "fork", upstream.to_str().unwrap()]);
        let repo = GitRepo::open(&work);
        let run = args("16.0", "17.0", "gadget", Some("fork"));
        let err = Preflight::new(&repo, &run).for_migration().unwrap_err();
        assert!(matches!(err, PortError::ComponentAlreadyPresent { .. }));
    }

    #[test]
    fn migration_requires_a_fork() {
        let (_tmp, work) = scenario();
        let repo = GitRepo::open(&work);
        let run = args("16.0", "17.0", "widget", None);
        let err = Preflight::new(&repo, &run).for_migration().unwrap_err();
        assert!(matches!(err, PortError::ForkRequired { .. }));
    }

    #[test]
    fn migration_aborts_on_untracked_files() {
        let (tmp, work) = scenario();
        let upstream = tmp.path().join("upstream");
        git(&work, &["remote", "add", "fork", upstream.to_str().unwrap()]);
        std::fs::write(work.join("notes.txt"), "scratch").unwrap();
        let repo = GitRepo::open(&work);
        let run = args("16.0", "17.0", "widget", Some("fork"));
        let err = Preflight::new(&repo, &run).for_migration().unwrap_err();
        assert!(matches!(
            err,
            PortError::UntrackedFiles { ref files } if files == &["notes.txt".to_string()]
        ));
    }

    #[test]
    fn migration_preflight_passes_for_an_absent_component() {
        let (tmp, work) = scenario();
        let upstream = tmp.path().join("upstream");
        git(&work, &["remote", "add", "fork", upstream.to_str().unwrap()]);
        let repo = GitRepo::open(&work);
        let run = args("16.0", "17.0", "widget", Some("fork"));
        let refs = Preflight::new(&repo, &run).for_migration().unwrap();
        assert_eq!(refs.source_ref, "origin/16.0");
        assert_eq!(refs.target_ref, "origin/17.0");
    }
}
