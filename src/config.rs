use crate::watcher::Verbosity;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Pushover message endpoint.
pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Config file read when `PAGEWATCH_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "pagewatch.toml";

/// Raw configuration as loaded from pagewatch.toml and the environment.
///
/// Every field is optional in the file; environment variables are layered on top
/// by [`WatchConfig::apply_env`], and the CLI `--url` flag wins over both.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub source_url: Option<String>,
    pub check_interval_secs: u64,
    pub debug_mode: bool,
    pub pulse_check: bool,
    pub pushover: PushoverConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushoverConfig {
    pub token: Option<String>,
    pub user: Option<String>,
    pub api_url: String,
}

/// Validated, immutable settings for one monitoring run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source_url: String,
    pub check_interval: Duration,
    pub verbosity: Verbosity,
    pub pushover: PushoverConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key}: expected a whole number of seconds")]
    InvalidInterval { key: &'static str, value: String },
    #[error("no source URL provided; set SOURCE_URL (environment or .env) or pass --url")]
    MissingSourceUrl,
}

// --- Default implementations ---

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            check_interval_secs: 60,
            debug_mode: false,
            pulse_check: false,
            pushover: PushoverConfig::default(),
        }
    }
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            token: None,
            user: None,
            api_url: PUSHOVER_API_URL.to_string(),
        }
    }
}

impl PushoverConfig {
    /// Both credentials present and non-empty.
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.token) && present(&self.user)
    }
}

/// Path of the config file: `PAGEWATCH_CONFIG` if set, else pagewatch.toml.
pub fn config_path() -> PathBuf {
    std::env::var_os("PAGEWATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load a config file. A missing file is not an error and yields defaults.
pub fn load(path: &Path) -> Result<WatchConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(WatchConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load `.env` from the working directory into the process environment.
///
/// Variables already present in the environment are left alone.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to load .env"),
    }
}

/// Interpret a boolean-like string: only `true` (any case) enables a flag.
fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

impl WatchConfig {
    /// Overlay environment variables using `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SOURCE_URL") {
            self.source_url = Some(url);
        }
        if let Some(raw) = lookup("CHECK_INTERVAL") {
            self.check_interval_secs =
                raw.trim().parse().map_err(|_| ConfigError::InvalidInterval {
                    key: "CHECK_INTERVAL",
                    value: raw.clone(),
                })?;
        }
        if let Some(raw) = lookup("DEBUG_MODE") {
            self.debug_mode = parse_flag(&raw);
        }
        if let Some(raw) = lookup("PULSE_CHECK") {
            self.pulse_check = parse_flag(&raw);
        }
        if let Some(token) = lookup("PUSHOVER_TOKEN") {
            self.pushover.token = Some(token);
        }
        if let Some(user) = lookup("PUSHOVER_USER") {
            self.pushover.user = Some(user);
        }
        if let Some(api_url) = lookup("PUSHOVER_API_URL") {
            self.pushover.api_url = api_url;
        }
        Ok(())
    }

    /// Apply the CLI override and validate into [`Settings`].
    pub fn resolve(self, cli_url: Option<&str>) -> Result<Settings, ConfigError> {
        let source_url = cli_url
            .map(str::to_string)
            .or(self.source_url)
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingSourceUrl)?;

        Ok(Settings {
            source_url,
            check_interval: Duration::from_secs(self.check_interval_secs),
            verbosity: Verbosity::from_flags(self.pulse_check, self.debug_mode),
            pushover: self.pushover,
        })
    }
}
