//! Replay state machine.
//!
//! The replay engine processes one unit at a time; [`UnitPhase`] names
//! where that unit stands and [`UnitProgress`] validates every move. The
//! state lives in memory only: each run rebuilds the pending map from git,
//! so there is nothing durable to recover.
//!
//! # Lifecycle
//!
//! ```text
//! NotStarted → BranchReady → {CommitApplied | CommitConflict | CommitSkipped}*
//!                      → UnitComplete → NoOp
//!                                     → PublishSkipped
//!                                     → Pushed → PrRefreshed
//!                                              → PrCreated
//!                                              → PublishSkipped
//! ```
//!
//! A conflict can only resolve into `CommitApplied` (operator fixed it) or
//! `CommitSkipped` (operator aborted the change-set).

use std::fmt;

// ---------------------------------------------------------------------------
// UnitPhase
// ---------------------------------------------------------------------------

/// The current phase of one unit's replay.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnitPhase {
    /// Nothing attempted yet.
    NotStarted,
    /// The replay branch exists and is checked out.
    BranchReady,
    /// The last change-set applied cleanly.
    CommitApplied,
    /// The last change-set hit a conflict; an `am` session is open.
    CommitConflict,
    /// The last change-set was skipped or aborted.
    CommitSkipped,
    /// Every change-set of the unit has been attempted.
    UnitComplete,
    /// The branch tip never moved; nothing to publish.
    NoOp,
    /// The branch was force-pushed to the fork.
    Pushed,
    /// An existing open change-request now carries the pushed work.
    PrRefreshed,
    /// A new draft change-request was opened.
    PrCreated,
    /// The operator declined publishing.
    PublishSkipped,
}

impl UnitPhase {
    /// Returns `true` if this phase ends the unit's processing.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NoOp | Self::PrRefreshed | Self::PrCreated | Self::PublishSkipped
        )
    }

    /// Returns the set of valid next phases from this phase.
    #[must_use]
    pub const fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::NotStarted => &[Self::BranchReady],
            Self::BranchReady | Self::CommitApplied | Self::CommitSkipped => &[
                Self::CommitApplied,
                Self::CommitConflict,
                Self::CommitSkipped,
                Self::UnitComplete,
            ],
            Self::CommitConflict => &[Self::CommitApplied, Self::CommitSkipped],
            Self::UnitComplete => &[Self::NoOp, Self::Pushed, Self::PublishSkipped],
            Self::Pushed => &[Self::PrRefreshed, Self::PrCreated, Self::PublishSkipped],
            Self::NoOp | Self::PrRefreshed | Self::PrCreated | Self::PublishSkipped => &[],
        }
    }

    /// Check whether transitioning to `next` is valid.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        self.valid_transitions().contains(next)
    }
}

impl fmt::Display for UnitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not-started"),
            Self::BranchReady => write!(f, "branch-ready"),
            Self::CommitApplied => write!(f, "commit-applied"),
            Self::CommitConflict => write!(f, "commit-conflict"),
            Self::CommitSkipped => write!(f, "commit-skipped"),
            Self::UnitComplete => write!(f, "unit-complete"),
            Self::NoOp => write!(f, "no-op"),
            Self::Pushed => write!(f, "pushed"),
            Self::PrRefreshed => write!(f, "pr-refreshed"),
            Self::PrCreated => write!(f, "pr-created"),
            Self::PublishSkipped => write!(f, "publish-skipped"),
        }
    }
}

// ---------------------------------------------------------------------------
// UnitProgress
// ---------------------------------------------------------------------------

/// Tracks one unit's replay, validating every transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitProgress {
    phase: UnitPhase,
}

impl UnitProgress {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: UnitPhase::NotStarted,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> &UnitPhase {
        &self.phase
    }

    /// Advance to `next`.
    ///
    /// # Errors
    /// Returns [`PhaseError::InvalidTransition`] if the move is not allowed;
    /// the phase is unchanged on error.
    pub fn advance(&mut self, next: UnitPhase) -> Result<(), PhaseError> {
        if !self.phase.can_transition_to(&next) {
            return Err(PhaseError::InvalidTransition {
                from: self.phase.clone(),
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }
}

impl Default for UnitProgress {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from the replay state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhaseError {
    /// Invalid phase transition.
    InvalidTransition {
        /// The current phase.
        from: UnitPhase,
        /// The attempted target phase.
        to: UnitPhase,
    },
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self::InvalidTransition { from, to } = self;
        write!(f, "invalid replay phase transition: {from} → {to}")
    }
}

impl std::error::Error for PhaseError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
