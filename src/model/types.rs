//! Foundation types for fwport.
//!
//! A change-set's low-level identifier is the only validated newtype: it
//! keys the correlator's side-table and the replay bookkeeping, so a
//! malformed hash must be rejected at the boundary instead of surfacing as
//! a failed git call later.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CommitSha
// ---------------------------------------------------------------------------

/// A validated 40-character lowercase hex commit hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitSha(String);

impl CommitSha {
    /// Create a new `CommitSha` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 40 lowercase hex characters.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the inner hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated hash for protocol output.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..7]
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.len() != 40 {
            return Err(ValidationError {
                kind: ErrorKind::CommitSha,
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(ValidationError {
                kind: ErrorKind::CommitSha,
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitSha {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CommitSha {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<CommitSha> for String {
    fn from(sha: CommitSha) -> Self {
        sha.0
    }
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A value failed validation at a model boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// What kind of value was being validated.
    pub kind: ErrorKind,
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

/// The kind of value a [`ValidationError`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A [`CommitSha`] validation error.
    CommitSha,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommitSha => write!(f, "commit hash"),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {}: {:?} ({})",
            self.kind, self.value, self.reason
        )
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";

    // -- CommitSha --

    #[test]
    fn valid_sha_accepted() {
        let sha = CommitSha::new(SHA).unwrap();
        assert_eq!(sha.as_str(), SHA);
        assert_eq!(sha.short(), "a94a8fe");
        assert_eq!(sha.to_string(), SHA);
    }

    #[test]
    fn wrong_length_rejected() {
        let err = CommitSha::new("abc123").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CommitSha);
        assert!(err.reason.contains("40 hex characters"));
    }

    #[test]
    fn uppercase_rejected() {
        let upper = SHA.to_uppercase();
        let err = CommitSha::new(&upper).unwrap_err();
        assert!(err.reason.contains("lowercase"));
    }

    #[test]
    fn non_hex_rejected() {
        let bad = "z".repeat(40);
        assert!(CommitSha::new(&bad).is_err());
    }

    #[test]
    fn from_str_and_try_from_agree() {
        let a: CommitSha = SHA.parse().unwrap();
        let b = CommitSha::try_from(SHA.to_string()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn serde_round_trip_as_plain_string() {
        let sha = CommitSha::new(SHA).unwrap();
        let json = serde_json::to_string(&sha).unwrap();
        assert_eq!(json, format!("\"{SHA}\""));
        let back: CommitSha = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sha);
    }

    #[test]
    fn serde_rejects_invalid_string() {
        let result: Result<CommitSha, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }

    #[test]
    fn validation_error_display_names_kind() {
        let err = CommitSha::new("x").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid commit hash"));
        assert!(msg.contains("\"x\""));
    }
}
