//! Error types for fwport.
//!
//! Defines [`PortError`], the unified error type for porting operations.
//! Error messages are designed to be operator-friendly: each variant includes
//! a clear description of what went wrong and actionable guidance on how to
//! fix it.

use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// PortError
// ---------------------------------------------------------------------------

/// Unified error type for porting operations.
///
/// Each variant is self-contained: an operator receiving this error should
/// be able to understand what happened and what to do next without
/// additional context.
#[derive(Debug)]
pub enum PortError {
    /// The working tree has uncommitted changes to tracked files.
    DirtyWorkTree,

    /// The working tree contains untracked files.
    UntrackedFiles {
        /// The untracked paths, relative to the repository root.
        files: Vec<String>,
    },

    /// A required git remote is not configured.
    RemoteMissing {
        /// The remote name that was expected.
        remote: String,
        /// What the remote is used for (`"upstream"` or `"fork"`).
        purpose: String,
        /// URL to suggest in the remediation, `<url>` when unknown.
        url_hint: String,
    },

    /// A branch could not be resolved on its remote.
    BranchNotFound {
        /// The branch name that was requested.
        branch: String,
        /// The remote it was looked up on.
        remote: String,
    },

    /// The operation must push a branch but no fork remote was given.
    ForkRequired {
        /// Fork owner, for the remediation hint.
        owner: String,
        /// Repository name, for the remediation hint.
        repo: String,
    },

    /// The component does not exist on the source branch.
    ComponentMissingOnSource {
        /// The component directory name.
        component: String,
        /// The source branch.
        source: String,
    },

    /// A port was requested but the component has never been migrated to
    /// the target branch.
    ComponentNotOnTarget {
        /// The component directory name.
        component: String,
        /// The target branch.
        target: String,
    },

    /// A migration was requested but the component already exists on the
    /// target branch.
    ComponentAlreadyPresent {
        /// The component directory name.
        component: String,
        /// The target branch.
        target: String,
    },

    /// The migration patch range produced nothing for the component.
    NothingToMigrate {
        /// The component directory name.
        component: String,
        /// The source branch.
        source: String,
    },

    /// Pending work exists and no interactive session is available to
    /// process it.
    PendingWork {
        /// Number of pending units.
        count: usize,
    },

    /// A git operation failed.
    Git(fwport_git::GitError),

    /// A forge request failed.
    Forge(fwport_github::GithubError),

    /// A configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// The decision store could not be read or written.
    Store {
        /// Path to the store file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// Git produced commit data that failed validation.
    InvalidCommitData {
        /// The value that failed validation.
        value: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// The replay engine attempted an invalid phase transition.
    Phase {
        /// The phase the unit was in.
        from: String,
        /// The phase that was requested.
        to: String,
    },

    /// An I/O error occurred during a porting operation.
    Io(std::io::Error),
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirtyWorkTree => {
                write!(
                    f,
                    "uncommitted changes detected in your working tree.\n  To fix: commit or stash them, then re-run:\n    git status"
                )
            }
            Self::UntrackedFiles { files } => {
                write!(f, "untracked files detected in your working tree:")?;
                for file in files {
                    write!(f, "\n  - {file}")?;
                }
                write!(
                    f,
                    "\n  To fix: add, ignore, or remove them before porting."
                )
            }
            Self::RemoteMissing {
                remote,
                purpose,
                url_hint,
            } => {
                write!(
                    f,
                    "no '{remote}' remote configured ({purpose}).\n  To fix: add it first:\n    git remote add {remote} {url_hint}"
                )
            }
            Self::BranchNotFound { branch, remote } => {
                write!(
                    f,
                    "branch '{branch}' not found on remote '{remote}'.\n  To fix: check the branch name, or fetch the remote:\n    git fetch {remote}"
                )
            }
            Self::ForkRequired { owner, repo } => {
                write!(
                    f,
                    "a fork remote is required for this operation.\n  To fix: add your fork and pass it with --fork:\n    git remote add <fork> git@github.com:{owner}/{repo}.git"
                )
            }
            Self::ComponentMissingOnSource { component, source } => {
                write!(
                    f,
                    "component '{component}' does not exist on source branch '{source}'.\n  To fix: check available components:\n    git ls-tree --name-only {source}"
                )
            }
            Self::ComponentNotOnTarget { component, target } => {
                write!(
                    f,
                    "component '{component}' has not been migrated to '{target}' yet.\n  To fix: run a migration instead:\n    fwport migrate <source> {target} {component}"
                )
            }
            Self::ComponentAlreadyPresent { component, target } => {
                write!(
                    f,
                    "component '{component}' already exists on '{target}'.\n  To fix: port pending pull requests instead:\n    fwport port <source> {target} {component}"
                )
            }
            Self::NothingToMigrate { component, source } => {
                write!(
                    f,
                    "no patches to migrate for '{component}'.\n  To fix: check that the component has history on the source branch:\n    git log --oneline {source} -- {component}"
                )
            }
            Self::PendingWork { count } => {
                write!(
                    f,
                    "{count} pending unit(s) left to process.\n  To fix: re-run without --non-interactive to process them."
                )
            }
            Self::Git(err) => {
                write!(
                    f,
                    "git operation failed: {err}\n  To fix: check repository state and retry. Run `git status` for details."
                )
            }
            Self::Forge(err) => {
                write!(
                    f,
                    "GitHub request failed: {err}\n  To fix: check network access and the GITHUB_TOKEN environment variable, then retry."
                )
            }
            Self::Config { path, detail } => {
                write!(
                    f,
                    "configuration error in '{}': {}\n  To fix: edit the config file and correct the issue.",
                    path.display(),
                    detail
                )
            }
            Self::Store { path, detail } => {
                write!(
                    f,
                    "decision store error in '{}': {}\n  To fix: repair or remove the file and re-run.",
                    path.display(),
                    detail
                )
            }
            Self::InvalidCommitData { value, reason } => {
                write!(
                    f,
                    "invalid commit data from git: {value:?} ({reason}).\n  To fix: check the repository history for unusual objects."
                )
            }
            Self::Phase { from, to } => {
                write!(
                    f,
                    "internal replay error: invalid phase transition {from} → {to}.\n  To fix: re-run the command; replay state is rebuilt from scratch."
                )
            }
            Self::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for PortError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Git(err) => Some(err),
            Self::Forge(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<std::io::Error> for PortError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<fwport_git::GitError> for PortError {
    fn from(err: fwport_git::GitError) -> Self {
        Self::Git(err)
    }
}

impl From<fwport_github::GithubError> for PortError {
    fn from(err: fwport_github::GithubError) -> Self {
        Self::Forge(err)
    }
}

impl From<crate::config::ConfigError> for PortError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config {
            path: err.path.unwrap_or_default(),
            detail: err.message,
        }
    }
}

impl From<crate::store::StoreError> for PortError {
    fn from(err: crate::store::StoreError) -> Self {
        Self::Store {
            path: err.path,
            detail: err.message,
        }
    }
}

impl From<crate::model::types::ValidationError> for PortError {
    fn from(err: crate::model::types::ValidationError) -> Self {
        Self::InvalidCommitData {
            value: err.value,
            reason: err.reason,
        }
    }
}

impl From<crate::replay_state::PhaseError> for PortError {
    fn from(err: crate::replay_state::PhaseError) -> Self {
        let crate::replay_state::PhaseError::InvalidTransition { from, to } = err;
        Self::Phase {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Display tests: every variant produces actionable output --

    #[test]
    fn display_dirty_work_tree() {
        let err = PortError::DirtyWorkTree;
        let msg = format!("{err}");
        assert!(msg.contains("uncommitted changes"));
        assert!(msg.contains("git status"));
    }

    #[test]
    fn display_untracked_files() {
        let err = PortError::UntrackedFiles {
            files: vec!["notes.txt".to_owned(), "scratch/".to_owned()],
        };
        let msg = format!("{err}");
        assert!(msg.contains("untracked files"));
        assert!(msg.contains("notes.txt"));
        assert!(msg.contains("scratch/"));
        assert!(msg.contains("add, ignore, or remove"));
    }

    #[test]
    fn display_remote_missing() {
        let err = PortError::RemoteMissing {
            remote: "fork".to_owned(),
            purpose: "fork".to_owned(),
            url_hint: "git@github.com:me/repo.git".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("no 'fork' remote"));
        assert!(msg.contains("git remote add fork git@github.com:me/repo.git"));
    }

    #[test]
    fn display_branch_not_found() {
        let err = PortError::BranchNotFound {
            branch: "99.0".to_owned(),
            remote: "origin".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("99.0"));
        assert!(msg.contains("git fetch origin"));
    }

    #[test]
    fn display_fork_required() {
        let err = PortError::ForkRequired {
            owner: "me".to_owned(),
            repo: "repo".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("--fork"));
        assert!(msg.contains("git@github.com:me/repo.git"));
    }

    #[test]
    fn display_component_missing_on_source() {
        let err = PortError::ComponentMissingOnSource {
            component: "widget".to_owned(),
            source: "16.0".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("widget"));
        assert!(msg.contains("16.0"));
        assert!(msg.contains("git ls-tree"));
    }

    #[test]
    fn display_component_not_on_target_suggests_migrate() {
        let err = PortError::ComponentNotOnTarget {
            component: "widget".to_owned(),
            target: "17.0".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("not been migrated"));
        assert!(msg.contains("fwport migrate"));
        assert!(msg.contains("17.0 widget"));
    }

    #[test]
    fn display_component_already_present_suggests_port() {
        let err = PortError::ComponentAlreadyPresent {
            component: "widget".to_owned(),
            target: "17.0".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("already exists"));
        assert!(msg.contains("fwport port"));
    }

    #[test]
    fn display_nothing_to_migrate() {
        let err = PortError::NothingToMigrate {
            component: "widget".to_owned(),
            source: "16.0".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("no patches to migrate"));
        assert!(msg.contains("git log --oneline 16.0 -- widget"));
    }

    #[test]
    fn display_pending_work() {
        let err = PortError::PendingWork { count: 3 };
        let msg = format!("{err}");
        assert!(msg.contains("3 pending unit(s)"));
        assert!(msg.contains("--non-interactive"));
    }

    #[test]
    fn display_git_error() {
        let err = PortError::Git(fwport_git::GitError::CommandFailed {
            args: "fetch origin".to_owned(),
            code: Some(128),
            stderr: "fatal: repository not found".to_owned(),
        });
        let msg = format!("{err}");
        assert!(msg.contains("git operation failed"));
        assert!(msg.contains("repository not found"));
        assert!(msg.contains("git status"));
    }

    #[test]
    fn display_config_error() {
        let err = PortError::Config {
            path: PathBuf::from(".fwport.toml"),
            detail: "unknown field 'foo'".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains(".fwport.toml"));
        assert!(msg.contains("unknown field 'foo'"));
        assert!(msg.contains("edit the config file"));
    }

    #[test]
    fn display_store_error() {
        let err = PortError::Store {
            path: PathBuf::from(".fwport.json"),
            detail: "expected object".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains(".fwport.json"));
        assert!(msg.contains("expected object"));
        assert!(msg.contains("repair or remove"));
    }

    #[test]
    fn display_invalid_commit_data() {
        let err = PortError::InvalidCommitData {
            value: "zzz".to_owned(),
            reason: "must be 40 hex characters".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("zzz"));
        assert!(msg.contains("40 hex characters"));
    }

    #[test]
    fn display_phase_error() {
        let err = PortError::Phase {
            from: "not-started".to_owned(),
            to: "pushed".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("not-started"));
        assert!(msg.contains("pushed"));
        assert!(msg.contains("re-run"));
    }

    #[test]
    fn display_io_error() {
        let err = PortError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "permission denied",
        ));
        let msg = format!("{err}");
        assert!(msg.contains("permission denied"));
        assert!(msg.contains("file permissions"));
    }

    // -- std::error::Error trait --

    #[test]
    fn error_source_git() {
        let err = PortError::Git(fwport_git::GitError::CommandFailed {
            args: "status".to_owned(),
            code: Some(1),
            stderr: String::new(),
        });
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_source_plain_variant_is_none() {
        let err = PortError::DirtyWorkTree;
        assert!(std::error::Error::source(&err).is_none());
    }

    // -- From impls --

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::other("disk full");
        let err: PortError = io_err.into();
        assert!(matches!(err, PortError::Io(_)));
    }

    #[test]
    fn from_config_error() {
        let cfg_err = crate::config::ConfigError {
            path: Some(PathBuf::from("/repo/.fwport.toml")),
            message: "bad syntax".to_owned(),
        };
        let err: PortError = cfg_err.into();
        match err {
            PortError::Config { path, detail } => {
                assert_eq!(path, PathBuf::from("/repo/.fwport.toml"));
                assert_eq!(detail, "bad syntax");
            }
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn from_validation_error() {
        let val_err = crate::model::types::ValidationError {
            kind: crate::model::types::ErrorKind::CommitSha,
            value: "nope".to_owned(),
            reason: "not hex".to_owned(),
        };
        let err: PortError = val_err.into();
        match err {
            PortError::InvalidCommitData { value, reason } => {
                assert_eq!(value, "nope");
                assert_eq!(reason, "not hex");
            }
            other => panic!("expected InvalidCommitData, got {other:?}"),
        }
    }
}
