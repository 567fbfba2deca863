//! Run configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional `mutscore.toml`, then command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "mutscore.toml";

/// How mutated files are isolated from the user's working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkspaceMode {
    /// Mutate the working tree directly, under a restore guard.
    #[default]
    InPlace,
    /// Each worker mutates a private temp copy of the project.
    Isolated,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Shell command that runs the test suite.
    pub test_command: String,
    /// Per-mutant test timeout in seconds.
    pub timeout_secs: u64,
    /// Files processed in parallel. Mutants of one file always run serially.
    pub workers: usize,
    pub workspace: WorkspaceMode,
    /// Run the suite once against unmutated code before mutating.
    pub baseline: bool,
    pub report_path: PathBuf,
    /// Directory the test command runs in; also the root copied in
    /// isolated mode. Defaults to the current directory.
    pub working_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            test_command: "npm test".to_string(),
            timeout_secs: 60,
            workers: 1,
            workspace: WorkspaceMode::InPlace,
            baseline: true,
            report_path: PathBuf::from(crate::state::DEFAULT_REPORT_PATH),
            working_dir: None,
        }
    }
}

impl Config {
    /// Load an explicit config file, or `mutscore.toml` from the current
    /// directory when present, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = PathBuf::from(CONFIG_FILE_NAME);
                if !candidate.exists() {
                    return Ok(Config::default());
                }
                candidate
            }
        };
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded config");
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.test_command.trim().is_empty() {
            return Err(ConfigError::Invalid("test_command must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolved_working_dir(&self) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match &self.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd,
        }
    }
}
