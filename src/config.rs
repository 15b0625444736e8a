use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::commit_message;

/// Name of the per-repository configuration file
pub const CONFIG_FILE_NAME: &str = "autopublish.toml";

/// Prefix for environment overrides, e.g. `AUTOPUBLISH__GIT__BRANCH`
pub const ENV_PREFIX: &str = "AUTOPUBLISH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", path.display())]
    MissingFile { path: PathBuf },
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
    #[error("Failed to load .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Main configuration structure for autopublish
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Content generator invocation
    pub generator: GeneratorConfig,
    /// Commit and push settings
    pub git: GitConfig,
    /// Credential leak protection
    pub safety: SafetyConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Interpreter or program to run
    pub program: String,
    /// Arguments passed to the program, typically the script path
    pub args: Vec<String>,
    /// Kill the generator after this many seconds; unset waits forever
    pub timeout_seconds: Option<u64>,
    /// Extra environment variables for the generator process
    pub env: BTreeMap<String, String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["blog.py".to_string()],
            timeout_seconds: None,
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Remote to push to; unset pushes to the branch's upstream
    pub remote: Option<String>,
    /// Branch to push; only meaningful together with `remote`
    pub branch: Option<String>,
    /// Commit message with `{timestamp}` and `{count}` placeholders
    pub commit_message_template: String,
    /// chrono strftime format for `{timestamp}`
    pub timestamp_format: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: None,
            branch: None,
            commit_message_template: "Auto-publish: {timestamp}".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Files that must never be tracked or committed
    pub protected_files: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            protected_files: vec![
                "client_secret.json".to_string(),
                "token.json".to_string(),
                ".env".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log level when `RUST_LOG` is not set
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl PublishConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. `autopublish.toml` in the repository root
    /// 3. An explicit configuration file (must exist)
    /// 4. Environment variables (prefixed with AUTOPUBLISH__)
    pub fn load(repo_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(repo_dir, explicit, None)
    }

    /// Same as [`PublishConfig::load`] but reads overrides from `env` instead of
    /// the process environment when given.
    pub fn load_with_env(
        repo_dir: &Path,
        explicit: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(
            File::from(repo_dir.join(CONFIG_FILE_NAME))
                .format(FileFormat::Toml)
                .required(false),
        );

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::MissingFile {
                    path: path.to_path_buf(),
                });
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(" ")
                .with_list_parse_key("generator.args")
                .with_list_parse_key("safety.protected_files")
                .source(env),
        );

        let config: PublishConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generator.program.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "generator.program",
                message: "must not be empty".to_string(),
            });
        }

        if self.git.branch.is_some() && self.git.remote.is_none() {
            return Err(ConfigError::Invalid {
                field: "git.branch",
                message: "requires git.remote to be set".to_string(),
            });
        }

        commit_message::check_timestamp_format(&self.git.timestamp_format).map_err(|e| ConfigError::Invalid {
            field: "git.timestamp_format",
            message: e.to_string(),
        })?;

        if self.generator.timeout_seconds == Some(0) {
            return Err(ConfigError::Invalid {
                field: "generator.timeout_seconds",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a `.env` file from the repository root if it exists
    pub fn load_env_file(repo_dir: &Path) -> Result<bool, ConfigError> {
        let path = repo_dir.join(".env");
        if path.exists() {
            dotenvy::from_path(&path)?;
            tracing::debug!(path = %path.display(), "Loaded environment variables from .env file");
            return Ok(true);
        }
        Ok(false)
    }
}
