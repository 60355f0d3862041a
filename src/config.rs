use anyhow::{Context, Result};
use directories::ProjectDirs;
use gitbar_core::{AuthSettings, FetchSettings, RefreshPolicy, RepoStatus, WidgetIcons};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Rejected configuration values. Fatal at startup.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("update_interval must be between 1 and 3600 seconds, got {0}")]
    UpdateInterval(u64),

    #[error("auth.fetch_timeout must be between 1 and 60 seconds, got {0}")]
    FetchTimeout(u64),

    #[error("advanced.cache_duration must be between 0 and 60 seconds, got {0}")]
    CacheDuration(u64),

    #[error("advanced.parallel_checks must be between 1 and 10, got {0}")]
    ParallelChecks(usize),

    #[error("logging.level must be one of trace, debug, info, warn, error; got '{0}'")]
    LogLevel(String),
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct Config {
    #[serde_as(as = "DurationSeconds<u64>")]
    pub update_interval: Duration,
    pub repositories: Vec<String>,
    pub auth: AuthConfig,
    pub advanced: AdvancedConfig,
    pub logging: LoggingConfig,
    pub display: DisplayConfig,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub enable_fetch: bool,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub fetch_timeout: Duration,
    pub use_gh_cli: bool,
    pub use_ssh_agent: bool,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct AdvancedConfig {
    #[serde_as(as = "DurationSeconds<u64>")]
    pub cache_duration: Duration,
    pub parallel_checks: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
#[serde(default)]
pub struct DisplayConfig {
    /// Bar text per status name, e.g. `uncommitted = "M"`
    pub icons: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(30),
            repositories: Vec::new(),
            auth: AuthConfig::default(),
            advanced: AdvancedConfig::default(),
            logging: LoggingConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enable_fetch: true,
            fetch_timeout: Duration::from_secs(5),
            use_gh_cli: true,
            use_ssh_agent: true,
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            cache_duration: Duration::from_secs(5),
            parallel_checks: 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

pub fn get_default_config_path() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "gitbar").context("Failed to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    Ok(config_dir.join("gitbar.toml"))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> String {
    let rest = if path == "~" {
        ""
    } else if let Some(rest) = path.strip_prefix("~/") {
        rest
    } else {
        return path.to_string();
    };

    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home.to_string_lossy().to_string(),
        Some(home) => home.join(rest).to_string_lossy().to_string(),
        None => path.to_string(),
    }
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p,
            None => get_default_config_path()?,
        };

        if !path.exists() {
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            default_config.save(&path)?;
            info!("Wrote sample configuration to {}", path.display());
            return Ok(default_config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let update = self.update_interval.as_secs();
        if !(1..=3600).contains(&update) {
            return Err(ConfigError::UpdateInterval(update));
        }
        let timeout = self.auth.fetch_timeout.as_secs();
        if !(1..=60).contains(&timeout) {
            return Err(ConfigError::FetchTimeout(timeout));
        }
        let cache = self.advanced.cache_duration.as_secs();
        if cache > 60 {
            return Err(ConfigError::CacheDuration(cache));
        }
        if !(1..=10).contains(&self.advanced.parallel_checks) {
            return Err(ConfigError::ParallelChecks(self.advanced.parallel_checks));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::LogLevel(self.logging.level.clone()));
        }
        Ok(())
    }

    /// Configured repositories with `~` expanded. Blank entries are kept;
    /// the scanner skips them.
    pub fn repository_paths(&self) -> Vec<String> {
        self.repositories.iter().map(|p| expand_home(p.trim())).collect()
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging
            .file
            .as_ref()
            .map(|p| PathBuf::from(expand_home(&p.to_string_lossy())))
    }

    pub fn refresh_policy(&self) -> Result<RefreshPolicy> {
        Ok(RefreshPolicy::new(self.update_interval, self.advanced.cache_duration)?)
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            use_cli_auth: self.auth.use_gh_cli,
            use_ssh_agent: self.auth.use_ssh_agent,
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            enabled: self.auth.enable_fetch,
            timeout: self.auth.fetch_timeout,
        }
    }

    /// Widget text overrides keyed by status; unknown names are ignored.
    pub fn widget_icons(&self) -> WidgetIcons {
        let mut icons = WidgetIcons::new();
        for (name, text) in &self.display.icons {
            match name.parse::<RepoStatus>() {
                Ok(status) => {
                    icons.insert(status, text.clone());
                }
                Err(e) => warn!("Ignoring icon override: {}", e),
            }
        }
        icons
    }
}

/// Where the configuration comes from, kept so it can be reloaded.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub repo_override: Vec<String>,
}

impl ConfigSource {
    pub fn from_cli(cli_args: &CliArgs) -> Result<Self> {
        let path = match &cli_args.config {
            Some(p) => p.clone(),
            None => get_default_config_path()?,
        };
        Ok(Self {
            path,
            repo_override: cli_args.repos.clone(),
        })
    }

    /// Load for startup. The flag is true when no file existed and a sample
    /// was written, so the caller can report it once logging is up.
    pub fn load_initial(&self) -> Result<(Config, bool)> {
        let existed = self.path.exists();
        let config = self.load()?;
        Ok((config, !existed && self.path.exists()))
    }

    pub fn load(&self) -> Result<Config> {
        let mut config = Config::load(Some(self.path.clone()))?;
        if !self.repo_override.is_empty() {
            config.repositories = self.repo_override.clone();
        }
        Ok(config)
    }

    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}
