//! Repository-level fwport configuration (`.fwport.toml`).
//!
//! Optional file at the working tree root. Everything has a default, so
//! most repositories need no config at all; the file exists for
//! repositories whose forge lives elsewhere or whose history carries
//! additional automation accounts.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// File name looked up at the working tree root.
pub const CONFIG_FILE_NAME: &str = ".fwport.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level fwport configuration.
///
/// Parsed from `.fwport.toml`. Missing fields use defaults; a missing file
/// is all defaults (no error).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FwportConfig {
    /// Forge endpoint settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// Fallback values for CLI flags.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// History reader exclusion lists.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Component detection settings.
    #[serde(default)]
    pub component: ComponentConfig,
}

// ---------------------------------------------------------------------------
// GithubConfig
// ---------------------------------------------------------------------------

/// Forge endpoint settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubConfig {
    /// REST endpoint root, without a trailing slash.
    /// The `GITHUB_API_URL` environment variable overrides it.
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_owned()
}

impl GithubConfig {
    /// Endpoint root after applying the environment override.
    #[must_use]
    pub fn effective_api_url(&self) -> String {
        std::env::var("GITHUB_API_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.api_url.clone())
    }
}

// ---------------------------------------------------------------------------
// DefaultsConfig
// ---------------------------------------------------------------------------

/// Fallback values for CLI flags, so routine invocations stay short.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Fallback for `--upstream-org`.
    #[serde(default)]
    pub upstream_org: Option<String>,

    /// Fallback for `--upstream` (default: `"origin"`).
    #[serde(default = "default_upstream_remote")]
    pub upstream_remote: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            upstream_org: None,
            upstream_remote: default_upstream_remote(),
        }
    }
}

fn default_upstream_remote() -> String {
    "origin".to_owned()
}

// ---------------------------------------------------------------------------
// HistoryConfig
// ---------------------------------------------------------------------------

/// Additions to the history reader's built-in exclusion lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// Author emails excluded from history walks, in addition to the
    /// built-in automation accounts.
    #[serde(default)]
    pub extra_bot_emails: Vec<String>,

    /// Summary markers excluded from history walks, in addition to the
    /// built-in auto-generated patterns.
    #[serde(default)]
    pub extra_skip_summaries: Vec<String>,
}

// ---------------------------------------------------------------------------
// ComponentConfig
// ---------------------------------------------------------------------------

/// How a component is recognized in the working tree.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentConfig {
    /// File names whose presence marks a directory as an installed
    /// component. Replaces the built-in list when set.
    #[serde(default = "default_manifest_files")]
    pub manifest_files: Vec<String>,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            manifest_files: default_manifest_files(),
        }
    }
}

fn default_manifest_files() -> Vec<String> {
    vec![
        "__manifest__.py".to_owned(),
        "__openerp__.py".to_owned(),
        "__terp__.py".to_owned(),
    ]
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a fwport configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl FwportConfig {
    /// Load configuration from the working tree root.
    pub fn load_from_repo(repo_root: &Path) -> Result<Self, ConfigError> {
        Self::load(&repo_root.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML or unknown fields,
    ///   returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                // Calculate line number from byte offset.
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_all_fields() {
        let cfg = FwportConfig::default();
        assert_eq!(cfg.github.api_url, "https://api.github.com");
        assert_eq!(cfg.defaults.upstream_org, None);
        assert_eq!(cfg.defaults.upstream_remote, "origin");
        assert!(cfg.history.extra_bot_emails.is_empty());
        assert!(cfg.history.extra_skip_summaries.is_empty());
        assert_eq!(
            cfg.component.manifest_files,
            vec!["__manifest__.py", "__openerp__.py", "__terp__.py"]
        );
    }

    #[test]
    fn parse_empty_string() {
        let cfg = FwportConfig::parse("").unwrap();
        assert_eq!(cfg, FwportConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[github]
api_url = "https://github.example.com/api/v3"

[defaults]
upstream_org = "acme"
upstream_remote = "upstream"

[history]
extra_bot_emails = ["ci@example.com"]
extra_skip_summaries = ["Auto-generated"]

[component]
manifest_files = ["MODULE.toml"]
"#;
        let cfg = FwportConfig::parse(toml).unwrap();
        assert_eq!(cfg.github.api_url, "https://github.example.com/api/v3");
        assert_eq!(cfg.defaults.upstream_org.as_deref(), Some("acme"));
        assert_eq!(cfg.defaults.upstream_remote, "upstream");
        assert_eq!(cfg.history.extra_bot_emails, vec!["ci@example.com"]);
        assert_eq!(cfg.history.extra_skip_summaries, vec!["Auto-generated"]);
        assert_eq!(cfg.component.manifest_files, vec!["MODULE.toml"]);
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let toml = r#"
[defaults]
upstream_org = "acme"
"#;
        let cfg = FwportConfig::parse(toml).unwrap();
        assert_eq!(cfg.defaults.upstream_org.as_deref(), Some("acme"));
        // Everything else is default.
        assert_eq!(cfg.defaults.upstream_remote, "origin");
        assert_eq!(cfg.github.api_url, "https://api.github.com");
        assert_eq!(cfg.component.manifest_files.len(), 3);
    }

    #[test]
    fn parse_rejects_unknown_top_level_field() {
        let toml = r"
unknown_field = true
";
        let err = FwportConfig::parse(toml).unwrap_err();
        assert!(
            err.message.contains("unknown field"),
            "error should mention unknown field: {}",
            err.message
        );
    }

    #[test]
    fn parse_rejects_unknown_nested_field() {
        let toml = r#"
[github]
api_url = "https://api.github.com"
extra = "oops"
"#;
        let err = FwportConfig::parse(toml).unwrap_err();
        assert!(
            err.message.contains("unknown field"),
            "error should mention unknown field: {}",
            err.message
        );
    }

    #[test]
    fn parse_includes_line_number_on_error() {
        let toml = "[github]\napi_url = 42\n";
        let err = FwportConfig::parse(toml).unwrap_err();
        assert!(
            err.message.contains("line"),
            "error should include line number: {}",
            err.message
        );
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = FwportConfig::load(Path::new("/nonexistent/.fwport.toml")).unwrap();
        assert_eq!(cfg, FwportConfig::default());
    }

    #[test]
    fn load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
[defaults]
upstream_org = "acme"
"#,
        )
        .unwrap();
        let cfg = FwportConfig::load_from_repo(dir.path()).unwrap();
        assert_eq!(cfg.defaults.upstream_org.as_deref(), Some("acme"));
    }

    #[test]
    fn load_invalid_file_shows_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid [[[toml").unwrap();
        let err = FwportConfig::load(&path).unwrap_err();
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
        assert!(!err.message.is_empty());
    }

    // -- ConfigError Display --

    #[test]
    fn config_error_display_with_path() {
        let err = ConfigError {
            path: Some(PathBuf::from("/repo/.fwport.toml")),
            message: "bad field".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("/repo/.fwport.toml"));
        assert!(msg.contains("bad field"));
    }

    #[test]
    fn config_error_display_without_path() {
        let err = ConfigError {
            path: None,
            message: "parse error".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("config error"));
        assert!(msg.contains("parse error"));
    }
}
