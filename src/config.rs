//! meetbear configuration management
//!
//! Configuration is a TOML file. Discovery order: an explicit `--config`
//! path, then `./.meetbear/config.toml`, then the per-user config directory
//! (`~/.config/meetbear/config.toml` on Linux).

use crate::error::{Error, Result};
use crate::fingerprint::FingerprintMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main meetbear configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetbearConfig {
    /// Watched directories
    pub directories: DirectoriesConfig,

    /// Note composition settings
    #[serde(default)]
    pub note_format: NoteFormatConfig,

    /// Scheduling and state settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Watched directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoriesConfig {
    /// Directory containing summary PDFs
    pub summary_dir: PathBuf,

    /// Directory containing transcript PDFs
    pub transcript_dir: PathBuf,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            summary_dir: PathBuf::from("~/Meetings/Summaries"),
            transcript_dir: PathBuf::from("~/Meetings/Transcripts"),
        }
    }
}

/// Note composition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteFormatConfig {
    /// Title template; `{date}` and `{name}` are substituted
    pub title_template: String,

    /// Separator line between the summary and transcript sections
    pub separator: String,

    /// Tags attached to every published note
    pub tags: Vec<String>,
}

impl Default for NoteFormatConfig {
    fn default() -> Self {
        Self {
            title_template: "{date} - {name}".to_string(),
            separator: "--==RAW NOTES==--".to_string(),
            tags: vec!["meeting".to_string(), "notes".to_string()],
        }
    }
}

/// Scheduling and state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Polling interval in watch mode, seconds
    pub interval_secs: u64,

    /// Quiet window required after the last change event for a path, seconds
    pub debounce_secs: u64,

    /// Path of the persisted state file
    pub state_file: PathBuf,

    /// How many prior state file versions to retain
    pub backup_count: usize,

    /// Change-detection mode: "hash" or "metadata"
    #[serde(default)]
    pub fingerprint: FingerprintMode,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            debounce_secs: 3,
            state_file: PathBuf::from(".meetbear/state.json"),
            backup_count: 3,
            fingerprint: FingerprintMode::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,

    /// Optional log file; stderr only when absent
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl MeetbearConfig {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// A missing file is a configuration error; `meetbear init` creates one.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => Self::default_path().ok_or_else(|| {
                Error::Config(
                    "no config file found; run `meetbear init` to create one".to_string(),
                )
            })?,
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        let mut config: MeetbearConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))?;
        config.expand_paths();
        Ok(config)
    }

    /// First existing default config path, if any.
    pub fn default_path() -> Option<PathBuf> {
        let local = local_config_path();
        if local.exists() {
            return Some(local);
        }
        let global = dirs_next::config_dir()?.join("meetbear").join("config.toml");
        global.exists().then_some(global)
    }

    /// Check the configuration before a run. Directory and count problems
    /// are fatal; template shape issues only warn.
    pub fn validate(&self) -> Result<()> {
        if !self.directories.summary_dir.is_dir() {
            return Err(Error::Config(format!(
                "summary directory does not exist: {}",
                self.directories.summary_dir.display()
            )));
        }
        if !self.directories.transcript_dir.is_dir() {
            return Err(Error::Config(format!(
                "transcript directory does not exist: {}",
                self.directories.transcript_dir.display()
            )));
        }
        if self.service.backup_count < 1 {
            return Err(Error::Config("backup_count must be at least 1".to_string()));
        }
        if self.note_format.title_template.trim().is_empty() {
            return Err(Error::Config("title template cannot be empty".to_string()));
        }

        if !self.note_format.title_template.contains("{date}") {
            tracing::warn!("Title template has no {{date}} placeholder");
        }
        if !self.note_format.title_template.contains("{name}") {
            tracing::warn!("Title template has no {{name}} placeholder");
        }
        if self.service.interval_secs < 60 {
            tracing::warn!(
                interval_secs = self.service.interval_secs,
                "Polling interval is under a minute"
            );
        }
        Ok(())
    }

    /// Write a default config to the local `.meetbear` directory.
    pub fn write_default(force: bool) -> Result<PathBuf> {
        let path = local_config_path();
        if path.exists() && !force {
            return Err(Error::Config(format!(
                "configuration already exists at {}; use --force to overwrite",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("create {}: {e}", parent.display())))?;
        }
        let toml = toml::to_string_pretty(&Self::default())
            .map_err(|e| Error::Config(format!("serialize default config: {e}")))?;
        std::fs::write(&path, toml)
            .map_err(|e| Error::Config(format!("write {}: {e}", path.display())))?;
        Ok(path)
    }

    fn expand_paths(&mut self) {
        self.directories.summary_dir = expand_home(&self.directories.summary_dir);
        self.directories.transcript_dir = expand_home(&self.directories.transcript_dir);
        self.service.state_file = expand_home(&self.service.state_file);
        if let Some(file) = &self.logging.file {
            self.logging.file = Some(expand_home(file));
        }
    }
}

fn local_config_path() -> PathBuf {
    PathBuf::from(".meetbear").join("config.toml")
}

/// Expand a leading `~/` against the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    let Ok(stripped) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs_next::home_dir() {
        Some(home) => home.join(stripped),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_round_trips() {
        let config = MeetbearConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: MeetbearConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.service.interval_secs, 300);
        assert_eq!(parsed.service.backup_count, 3);
        assert_eq!(parsed.note_format.separator, "--==RAW NOTES==--");
        assert_eq!(parsed.service.fingerprint, FingerprintMode::Hash);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let toml = r#"
            [directories]
            summary_dir = "/tmp/summaries"
            transcript_dir = "/tmp/transcripts"
        "#;
        let config: MeetbearConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.note_format.title_template, "{date} - {name}");
        assert_eq!(config.service.debounce_secs, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_fingerprint_mode_from_toml() {
        let toml = r#"
            [directories]
            summary_dir = "/tmp/s"
            transcript_dir = "/tmp/t"

            [service]
            interval_secs = 60
            debounce_secs = 2
            state_file = "/tmp/state.json"
            backup_count = 2
            fingerprint = "metadata"
        "#;
        let config: MeetbearConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.service.fingerprint, FingerprintMode::Metadata);
    }

    #[test]
    fn test_validate_missing_directory() {
        let dir = TempDir::new().unwrap();
        let mut config = MeetbearConfig::default();
        config.directories.summary_dir = dir.path().join("missing");
        config.directories.transcript_dir = dir.path().to_path_buf();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_zero_backup_count() {
        let dir = TempDir::new().unwrap();
        let mut config = MeetbearConfig::default();
        config.directories.summary_dir = dir.path().to_path_buf();
        config.directories.transcript_dir = dir.path().to_path_buf();
        config.service.backup_count = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_ok() {
        let dir = TempDir::new().unwrap();
        let mut config = MeetbearConfig::default();
        config.directories.summary_dir = dir.path().to_path_buf();
        config.directories.transcript_dir = dir.path().to_path_buf();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs_next::home_dir() {
            assert_eq!(
                expand_home(Path::new("~/meetings")),
                home.join("meetings")
            );
        }
        assert_eq!(expand_home(Path::new("/abs/path")), PathBuf::from("/abs/path"));
    }
}
