//! Configuration module for fwatch.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, defaults, and a builder for programmatic
//! use. Durations are written in `humantime` syntax (`"20m"`, `"250ms"`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, GroupSettings, DEFAULT_POLL, DEFAULT_SETTLE, MAX_SETTLE};

/// Default delay of the simulated upload transport.
pub const DEFAULT_UPLOAD_DELAY: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Top-level configuration for fwatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the upload ledger database. Required.
    #[serde(default)]
    pub database: Option<PathBuf>,
    /// Default poll period for groups that do not set `poll_period`.
    #[serde(default = "default_poll", with = "humantime_serde")]
    pub poll: Duration,
    /// Default settle time for groups that do not set `settle_time`.
    #[serde(default = "default_settle", with = "humantime_serde")]
    pub settle: Duration,
    /// How long the simulated transport takes per upload.
    #[serde(default = "default_upload_delay", with = "humantime_serde")]
    pub upload_delay: Duration,
    /// Watch groups keyed by name.
    #[serde(default)]
    pub files: BTreeMap<String, GroupConfig>,
}

/// One watch group as written in the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Regular expression matched against file names.
    #[serde(default)]
    pub filename_match: Option<String>,
    /// Overrides the top-level `settle`.
    #[serde(default, with = "humantime_serde")]
    pub settle_time: Option<Duration>,
    /// Overrides the top-level `poll`.
    #[serde(default, with = "humantime_serde")]
    pub poll_period: Option<Duration>,
    /// Traverse directories below the roots.
    #[serde(default)]
    pub recursive: bool,
    /// Root directories or files.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    /// Notification recipients.
    #[serde(default)]
    pub email: Vec<String>,
    /// Notification template; carried, not rendered.
    #[serde(default)]
    pub email_template: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_type_content: Option<String>,
}

fn default_poll() -> Duration {
    DEFAULT_POLL
}

fn default_settle() -> Duration {
    DEFAULT_SETTLE
}

fn default_upload_delay() -> Duration {
    DEFAULT_UPLOAD_DELAY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            poll: DEFAULT_POLL,
            settle: DEFAULT_SETTLE,
            upload_delay: DEFAULT_UPLOAD_DELAY,
            files: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("error opening config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content).context("parsing config file")?;
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/fwatch/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("fwatch")
            .join("config.yaml")
    }

    /// Resolves every group against the top-level defaults.
    ///
    /// # Errors
    /// Fails on the first group whose settings cannot be built; the
    /// configuration should normally be [validated](Config::validate) first.
    pub fn group_settings(&self) -> Result<Vec<GroupSettings>, DomainError> {
        if self.files.is_empty() {
            return Err(DomainError::NoGroups);
        }

        self.files
            .iter()
            .map(|(name, group)| {
                if group.paths.is_empty() {
                    return Err(DomainError::EmptyGroup(name.clone()));
                }
                let settings = GroupSettings::new(name.clone(), group.paths.clone())
                    .with_recursive(group.recursive)
                    .with_settle(group.settle_time.unwrap_or(self.settle))
                    .with_poll(group.poll_period.unwrap_or(self.poll))
                    .with_recipients(group.email.clone());
                match &group.filename_match {
                    Some(pattern) => settings.with_filter(pattern),
                    None => Ok(settings),
                }
            })
            .collect()
    }

    /// Returns the ledger path or [`DomainError::MissingDatabase`].
    pub fn database_path(&self) -> Result<&Path, DomainError> {
        self.database
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(DomainError::MissingDatabase)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"files.logs.paths"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.database_path().is_err() {
            errors.push(ValidationError {
                field: "database".into(),
                message: "not set".into(),
            });
        }
        if self.files.is_empty() {
            errors.push(ValidationError {
                field: "files".into(),
                message: "no groups set".into(),
            });
        }

        for (field, value) in [
            ("poll", self.poll),
            ("settle", self.settle),
        ] {
            if value.is_zero() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        }
        if self.settle > MAX_SETTLE {
            errors.push(settle_too_long("settle".into()));
        }

        for (name, group) in &self.files {
            if group.paths.is_empty() {
                errors.push(ValidationError {
                    field: format!("files.{name}.paths"),
                    message: "at least one path is required".into(),
                });
            }
            if let Some(pattern) = &group.filename_match {
                if let Err(e) = Regex::new(pattern) {
                    errors.push(ValidationError {
                        field: format!("files.{name}.filename_match"),
                        message: format!("invalid pattern '{pattern}': {e}"),
                    });
                }
            }
            if group.settle_time.is_some_and(|d| d.is_zero()) {
                errors.push(ValidationError {
                    field: format!("files.{name}.settle_time"),
                    message: "must be greater than 0".into(),
                });
            }
            if group.settle_time.is_some_and(|d| d > MAX_SETTLE) {
                errors.push(settle_too_long(format!("files.{name}.settle_time")));
            }
            if group.poll_period.is_some_and(|d| d.is_zero()) {
                errors.push(ValidationError {
                    field: format!("files.{name}.poll_period"),
                    message: "must be greater than 0".into(),
                });
            }
        }

        errors
    }
}

fn settle_too_long(field: String) -> ValidationError {
    ValidationError {
        field,
        message: format!("must not exceed {} days", MAX_SETTLE.as_secs() / 86_400),
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use fwatch_core::config::{ConfigBuilder, GroupConfig};
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// let config = ConfigBuilder::new()
///     .database(PathBuf::from("/var/lib/fwatch/uploads.db"))
///     .settle(Duration::from_secs(60))
///     .group("logs", GroupConfig {
///         paths: vec![PathBuf::from("/var/log/products")],
///         ..Default::default()
///     })
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn database(mut self, path: PathBuf) -> Self {
        self.config.database = Some(path);
        self
    }

    pub fn poll(mut self, poll: Duration) -> Self {
        self.config.poll = poll;
        self
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.config.settle = settle;
        self
    }

    pub fn upload_delay(mut self, delay: Duration) -> Self {
        self.config.upload_delay = delay;
        self
    }

    pub fn group(mut self, name: impl Into<String>, group: GroupConfig) -> Self {
        self.config.files.insert(name.into(), group);
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn group_with_paths(paths: &[&str]) -> GroupConfig {
        GroupConfig {
            paths: paths.iter().map(PathBuf::from).collect(),
            ..Default::default()
        }
    }

    // -- Defaults --

    #[test]
    fn default_config_uses_default_timings() {
        let cfg = Config::default();
        assert_eq!(cfg.poll, Duration::from_secs(300));
        assert_eq!(cfg.settle, Duration::from_secs(1200));
        assert_eq!(cfg.upload_delay, Duration::from_secs(5));
        assert!(cfg.database.is_none());
        assert!(cfg.files.is_empty());
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("fwatch/config.yaml"));
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
database: /var/lib/fwatch/uploads.db
poll: 30s
settle: 10m
upload_delay: 250ms
files:
  vgosDB:
    filename_match: '^.*\.tgz$'
    settle_time: 1h
    recursive: true
    paths:
      - /shared/vgosDB
    email:
      - ops@example.com
    email_template: "{{.Path}} uploaded"
  apriori:
    poll_period: 2m
    paths:
      - /shared/apriori_files/blokq.dat
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(
            cfg.database,
            Some(PathBuf::from("/var/lib/fwatch/uploads.db"))
        );
        assert_eq!(cfg.poll, Duration::from_secs(30));
        assert_eq!(cfg.settle, Duration::from_secs(600));
        assert_eq!(cfg.upload_delay, Duration::from_millis(250));
        assert_eq!(cfg.files.len(), 2);

        let vgos = &cfg.files["vgosDB"];
        assert_eq!(vgos.filename_match.as_deref(), Some(r"^.*\.tgz$"));
        assert_eq!(vgos.settle_time, Some(Duration::from_secs(3600)));
        assert!(vgos.recursive);
        assert_eq!(vgos.email, vec!["ops@example.com".to_string()]);

        let apriori = &cfg.files["apriori"];
        assert_eq!(apriori.poll_period, Some(Duration::from_secs(120)));
        assert!(!apriori.recursive);

        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_applies_defaults_for_missing_timings() {
        let yaml = "database: db.sqlite\nfiles:\n  a:\n    paths: [/tmp]\n";
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(yaml.as_bytes()).unwrap();

        let cfg = Config::load(tmp.path()).unwrap();
        assert_eq!(cfg.poll, DEFAULT_POLL);
        assert_eq!(cfg.settle, DEFAULT_SETTLE);
        assert!(cfg.files["a"].settle_time.is_none());
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"files: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn load_returns_error_on_bad_duration() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"database: x.db\nsettle: soon\n").unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn load_returns_error_on_missing_file() {
        assert!(Config::load(Path::new("/nonexistent/fwatch.yaml")).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_missing_database_and_groups() {
        let errors = Config::default().validate();
        assert!(errors.iter().any(|e| e.field == "database"));
        assert!(errors.iter().any(|e| e.field == "files"));
    }

    #[test]
    fn validate_catches_empty_database_path() {
        let cfg = ConfigBuilder::new()
            .database(PathBuf::new())
            .group("a", group_with_paths(&["/tmp"]))
            .build();
        assert!(cfg.validate().iter().any(|e| e.field == "database"));
    }

    #[test]
    fn validate_catches_group_without_paths() {
        let cfg = ConfigBuilder::new()
            .database(PathBuf::from("db"))
            .group("empty", GroupConfig::default())
            .build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "files.empty.paths"));
    }

    #[test]
    fn validate_catches_bad_pattern() {
        let cfg = ConfigBuilder::new()
            .database(PathBuf::from("db"))
            .group(
                "bad",
                GroupConfig {
                    filename_match: Some("([".into()),
                    ..group_with_paths(&["/tmp"])
                },
            )
            .build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "files.bad.filename_match"));
    }

    #[test]
    fn validate_catches_zero_durations() {
        let cfg = ConfigBuilder::new()
            .database(PathBuf::from("db"))
            .settle(Duration::ZERO)
            .group(
                "a",
                GroupConfig {
                    poll_period: Some(Duration::ZERO),
                    ..group_with_paths(&["/tmp"])
                },
            )
            .build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "settle"));
        assert!(errors.iter().any(|e| e.field == "files.a.poll_period"));
    }

    #[test]
    fn validate_catches_settle_beyond_limit() {
        let cfg = ConfigBuilder::new()
            .database(PathBuf::from("db"))
            .settle(MAX_SETTLE + Duration::from_secs(1))
            .group(
                "a",
                GroupConfig {
                    settle_time: Some(Duration::from_secs(3 * 365 * 24 * 60 * 60)),
                    ..group_with_paths(&["/tmp"])
                },
            )
            .group(
                "b",
                GroupConfig {
                    settle_time: Some(MAX_SETTLE),
                    ..group_with_paths(&["/tmp"])
                },
            )
            .build();
        let errors = cfg.validate();
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors
            .iter()
            .any(|e| e.field == "settle" && e.message == "must not exceed 365 days"));
        assert!(errors.iter().any(|e| e.field == "files.a.settle_time"));
    }

    #[test]
    fn settle_from_yaml_beyond_limit_is_rejected() {
        let cfg: Config = serde_yaml::from_str(
            "database: db\nsettle: 3years\nfiles:\n  a:\n    paths: [/tmp]\n",
        )
        .unwrap();
        assert!(cfg.validate().iter().any(|e| e.field == "settle"));
        // Settings built without validation are capped instead
        let settings = cfg.group_settings().unwrap();
        assert_eq!(settings[0].settle, MAX_SETTLE);
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "files.a.paths".into(),
            message: "at least one path is required".into(),
        };
        assert_eq!(err.to_string(), "files.a.paths: at least one path is required");
    }

    // -- Group resolution --

    #[test]
    fn group_settings_inherit_defaults() {
        let cfg = ConfigBuilder::new()
            .database(PathBuf::from("db"))
            .poll(Duration::from_secs(7))
            .settle(Duration::from_secs(11))
            .group("a", group_with_paths(&["/tmp"]))
            .group(
                "b",
                GroupConfig {
                    settle_time: Some(Duration::from_millis(50)),
                    poll_period: Some(Duration::from_millis(20)),
                    recursive: true,
                    filename_match: Some(r"\.dat$".into()),
                    email: vec!["ops@example.com".into()],
                    ..group_with_paths(&["/srv"])
                },
            )
            .build();

        let groups = cfg.group_settings().unwrap();
        assert_eq!(groups.len(), 2);

        let a = groups.iter().find(|g| g.name == "a").unwrap();
        assert_eq!(a.poll, Duration::from_secs(7));
        assert_eq!(a.settle, Duration::from_secs(11));
        assert!(a.filter.is_none());

        let b = groups.iter().find(|g| g.name == "b").unwrap();
        assert_eq!(b.settle, Duration::from_millis(50));
        assert_eq!(b.poll, Duration::from_millis(20));
        assert!(b.recursive);
        assert!(b.matches(Path::new("/srv/x.dat")));
        assert!(!b.matches(Path::new("/srv/x.txt")));
        assert_eq!(b.recipients, vec!["ops@example.com".to_string()]);
    }

    #[test]
    fn group_settings_require_groups() {
        let cfg = ConfigBuilder::new().database(PathBuf::from("db")).build();
        assert_eq!(cfg.group_settings().unwrap_err(), DomainError::NoGroups);
    }

    #[test]
    fn database_path_reports_missing() {
        assert_eq!(
            Config::default().database_path().unwrap_err(),
            DomainError::MissingDatabase
        );
    }

    #[test]
    fn builder_build_validated_fails_for_invalid_config() {
        let result = ConfigBuilder::new().settle(Duration::ZERO).build_validated();
        let errors = result.unwrap_err();
        assert!(errors.len() >= 3);
    }
}
