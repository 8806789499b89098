//! User configuration.
//!
//! Read from `~/.config/deskpim/config.toml` (or `--config`).  Every key is
//! optional; a missing file means "all defaults".  Command-line flags are
//! applied on top by `main`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::fetch::DEFAULT_LOOKAHEAD_DAYS;
use crate::poll::{PollSettings, DEFAULT_INTERVAL};
use crate::snapshot::ChangePolicy;
use crate::store::ActionCommands;

/// Longest calendar lookahead accepted, in days.
pub const MAX_LOOKAHEAD_DAYS: u32 = 366;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path or URL of the `.ics` document.
    pub source: Option<String>,
    pub lookahead_days: u32,
    pub task_interval_secs: u64,
    pub calendar_interval_secs: u64,
    pub change_policy: ChangePolicy,
    #[serde(flatten)]
    pub commands: ActionCommands,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            task_interval_secs: DEFAULT_INTERVAL.as_secs(),
            calendar_interval_secs: DEFAULT_INTERVAL.as_secs(),
            change_policy: ChangePolicy::default(),
            commands: ActionCommands::default(),
            log_file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("deskpim").join("config.toml"))
    }

    /// Load `path`, or the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "no source configured; set `source` in the config file or pass --source".into(),
            ));
        }
        if !(1..=MAX_LOOKAHEAD_DAYS).contains(&self.lookahead_days) {
            return Err(ConfigError::Invalid(format!(
                "lookahead_days must be between 1 and {MAX_LOOKAHEAD_DAYS}"
            )));
        }
        if self.task_interval_secs == 0 || self.calendar_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll intervals must be at least 1 second".into()));
        }
        Ok(())
    }

    /// The source with a leading `~` expanded.
    pub fn source(&self) -> Option<String> {
        self.source
            .as_deref()
            .map(|source| shellexpand::tilde(source).into_owned())
    }

    pub fn task_polling(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.task_interval_secs),
            policy: self.change_policy,
        }
    }

    pub fn calendar_polling(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.calendar_interval_secs),
            policy: self.change_policy,
        }
    }

    /// Where logs go; defaults to the user cache directory.
    pub fn log_path(&self) -> PathBuf {
        match &self.log_file {
            Some(path) => PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned()),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("deskpim")
                .join("deskpim.log"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.lookahead_days, 7);
        assert_eq!(config.task_polling().interval, Duration::from_secs(10));
        assert_eq!(config.change_policy, ChangePolicy::NewItems);
    }

    #[test]
    fn full_file_parses() {
        let config: Config = toml::from_str(
            r#"
            source = "https://example.com/me.ics"
            lookahead_days = 14
            task_interval_secs = 30
            calendar_interval_secs = 60
            change_policy = "exact"
            open_command = ["xdg-open", "{source}"]
            new_task_command = ["thunderbird", "-task"]
            log_file = "/tmp/deskpim.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.as_deref(), Some("https://example.com/me.ics"));
        assert_eq!(config.lookahead_days, 14);
        assert_eq!(config.task_polling().interval, Duration::from_secs(30));
        assert_eq!(config.calendar_polling().interval, Duration::from_secs(60));
        assert_eq!(config.calendar_polling().policy, ChangePolicy::Exact);
        assert_eq!(
            config.commands.open,
            Some(vec!["xdg-open".to_string(), "{source}".to_string()])
        );
        assert!(config.commands.new_appointment.is_none());
        assert_eq!(config.log_path(), PathBuf::from("/tmp/deskpim.log"));
        config.validate().unwrap();
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(toml::from_str::<Config>(r#"change_policy = "sometimes""#).is_err());
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_err(), "source is required");

        config.source = Some("/tmp/cal.ics".into());
        config.validate().unwrap();

        config.lookahead_days = 0;
        assert!(config.validate().is_err());

        config.lookahead_days = MAX_LOOKAHEAD_DAYS + 1;
        assert!(config.validate().is_err(), "lookahead is capped");
        config.lookahead_days = MAX_LOOKAHEAD_DAYS;
        config.validate().unwrap();

        config.lookahead_days = 3;
        config.task_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "lookahead_days = \"soon\"").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn home_prefix_is_expanded() {
        let config = Config {
            source: Some("~/cal/me.ics".into()),
            ..Default::default()
        };
        let source = config.source().unwrap();
        if dirs::home_dir().is_some() {
            assert!(!source.starts_with('~'));
            assert!(source.ends_with("cal/me.ics"));
        }

        let remote = Config {
            source: Some("https://x/~/y".into()),
            ..Default::default()
        };
        assert_eq!(remote.source().as_deref(), Some("https://x/~/y"));
    }

    #[test]
    fn bare_tilde_is_the_home_directory() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let config = Config {
            source: Some("~".into()),
            log_file: Some(PathBuf::from("~")),
            ..Default::default()
        };
        assert_eq!(config.source().map(PathBuf::from), Some(home.clone()));
        assert_eq!(config.log_path(), home);
    }
}
