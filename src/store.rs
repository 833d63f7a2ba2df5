//! Persistent opt-out store (`.fwport.json`).
//!
//! Records "never port this" decisions at the repository root, keyed by
//! source branch, then target branch, then component. Decisions taken for
//! one branch pair never affect another. Every write is atomic
//! (write-to-temp + fsync + rename) so a crash never corrupts the file.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name looked up at the working tree root.
pub const STORE_FILE_NAME: &str = ".fwport.json";

type ComponentMap = BTreeMap<String, ComponentEntry>;
type TargetMap = BTreeMap<String, ComponentMap>;
type SourceMap = BTreeMap<String, TargetMap>;

// ---------------------------------------------------------------------------
// ComponentEntry
// ---------------------------------------------------------------------------

/// Persisted decisions for one component under one branch pair.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// The whole component is opted out for this branch pair.
    #[serde(default)]
    pub component_blacklisted: bool,

    /// Individual units opted out, keyed by unit reference
    /// (`"#123"` or `"orphaned-commits"`).
    #[serde(default)]
    pub unit_blacklist: BTreeMap<String, bool>,
}

// ---------------------------------------------------------------------------
// DecisionStore
// ---------------------------------------------------------------------------

/// Handle on the opt-out store, bound to one source branch, target branch
/// and component.
///
/// Loaded once per invocation; every recorded decision is written through
/// to disk immediately. Entries belonging to other branch pairs or
/// components are preserved verbatim across writes.
#[derive(Debug)]
pub struct DecisionStore {
    path: PathBuf,
    source: String,
    target: String,
    component: String,
    data: SourceMap,
}

impl DecisionStore {
    /// Load the store from the working tree root.
    ///
    /// A missing file is an empty store (not an error).
    ///
    /// # Errors
    /// Returns [`StoreError`] on I/O errors (other than not-found) or
    /// malformed JSON.
    pub fn load(
        repo_root: &Path,
        source: &str,
        target: &str,
        component: &str,
    ) -> Result<Self, StoreError> {
        let path = repo_root.join(STORE_FILE_NAME);
        let data = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| StoreError {
                path: path.clone(),
                message: format!("malformed store: {e}"),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SourceMap::new(),
            Err(e) => {
                return Err(StoreError {
                    path,
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Ok(Self {
            path,
            source: source.to_owned(),
            target: target.to_owned(),
            component: component.to_owned(),
            data,
        })
    }

    /// Path of the underlying store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry(&self) -> Option<&ComponentEntry> {
        self.data
            .get(&self.source)
            .and_then(|targets| targets.get(&self.target))
            .and_then(|components| components.get(&self.component))
    }

    fn entry_mut(&mut self) -> &mut ComponentEntry {
        self.data
            .entry(self.source.clone())
            .or_default()
            .entry(self.target.clone())
            .or_default()
            .entry(self.component.clone())
            .or_default()
    }

    /// Whether the whole component is opted out for this branch pair.
    #[must_use]
    pub fn is_component_blacklisted(&self) -> bool {
        self.entry().is_some_and(|e| e.component_blacklisted)
    }

    /// Whether a unit is opted out for this branch pair.
    #[must_use]
    pub fn is_unit_blacklisted(&self, unit_ref: &str) -> bool {
        self.entry()
            .is_some_and(|e| e.unit_blacklist.get(unit_ref).copied().unwrap_or(false))
    }

    /// Record that the whole component should never be ported to the
    /// target branch, and persist immediately.
    ///
    /// # Errors
    /// Returns [`StoreError`] on I/O or serialization failure.
    pub fn blacklist_component(&mut self) -> Result<(), StoreError> {
        self.entry_mut().component_blacklisted = true;
        self.persist()
    }

    /// Record that a unit should never be ported to the target branch,
    /// and persist immediately.
    ///
    /// # Errors
    /// Returns [`StoreError`] on I/O or serialization failure.
    pub fn blacklist_unit(&mut self, unit_ref: &str) -> Result<(), StoreError> {
        self.entry_mut()
            .unit_blacklist
            .insert(unit_ref.to_owned(), true);
        self.persist()
    }

    /// Write the store atomically with fsync.
    ///
    /// 1. Serialize to pretty JSON.
    /// 2. Write to a temporary file in the same directory.
    /// 3. fsync the temporary file.
    /// 4. Rename (atomic on POSIX) over the target path.
    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.data).map_err(|e| StoreError {
            path: self.path.clone(),
            message: format!("serialize: {e}"),
        })?;

        let dir = self.path.parent().ok_or_else(|| StoreError {
            path: self.path.clone(),
            message: "no parent directory".to_owned(),
        })?;

        // Write to a temporary file in the same directory (ensures same filesystem)
        let tmp_path = dir.join(".fwport.json.tmp");
        let mut file = fs::File::create(&tmp_path).map_err(|e| StoreError {
            path: self.path.clone(),
            message: format!("create {}: {e}", tmp_path.display()),
        })?;
        file.write_all(json.as_bytes()).map_err(|e| StoreError {
            path: self.path.clone(),
            message: format!("write {}: {e}", tmp_path.display()),
        })?;
        file.sync_all().map_err(|e| StoreError {
            path: self.path.clone(),
            message: format!("fsync {}: {e}", tmp_path.display()),
        })?;
        drop(file);

        // Atomic rename
        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError {
            path: self.path.clone(),
            message: format!("rename {} → {}: {e}", tmp_path.display(), self.path.display()),
        })?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Error reading or writing the opt-out store.
#[derive(Debug)]
pub struct StoreError {
    /// Path of the store file.
    pub path: PathBuf,
    /// Human-readable description of the problem.
    pub message: String,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
