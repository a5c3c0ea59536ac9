//! CLI configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML/YAML file,
//! then `MEDICAT_*` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use medicat_http::client::{DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_REFRESH_PATH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "MEDICAT";
const STATE_DIR_VAR: &str = "MEDICAT_STATE_DIR";
const CONFIG_FILE: &str = "medicat.toml";
const CREDENTIALS_FILE: &str = "credentials.json";

/// Client settings for the `medicat` CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Backend API origin
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds (0 = no timeout)
    #[serde(default)]
    pub timeout_secs: u64,

    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    #[serde(default = "default_logout_path")]
    pub logout_path: String,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_logout_path() -> String {
    DEFAULT_LOGOUT_PATH.to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: 0,
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
        }
    }
}

impl CliConfig {
    /// Load configuration for a state directory
    ///
    /// An explicit `path` must exist; otherwise `<state_dir>/medicat.toml` is
    /// read when present.
    pub fn load(path: Option<&Path>, state_dir: &Path) -> Result<Self> {
        Self::load_with_env(path, state_dir, None)
    }

    fn load_with_env(
        path: Option<&Path>,
        state_dir: &Path,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();

        // Start with defaults
        builder = builder.add_source(Config::try_from(&Self::default())?);

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::from(state_dir.join(CONFIG_FILE)).required(false)),
        };

        // Environment variables override file settings
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let settings = builder.build().context("failed to load configuration")?;
        settings
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Request timeout, if one is configured
    pub const fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Resolve the state directory holding credentials and configuration
pub fn state_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        // Check environment variable first, then fall back to system data dir
        if let Ok(dir) = std::env::var(STATE_DIR_VAR) {
            PathBuf::from(dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("medicat")
        }
    })
}

/// Location of the persisted credential pair
pub fn credentials_path(state_dir: &Path) -> PathBuf {
    state_dir.join(CREDENTIALS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            vars.iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::load_with_env(None, dir.path(), env(&[])).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.base_url, "http://localhost:8000/api");
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn file_then_environment_override_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "base_url = \"https://pharmacy.example/api\"\nrefresh_path = \"/refresh/\"\n",
        )
        .unwrap();

        let config = CliConfig::load_with_env(
            None,
            dir.path(),
            env(&[("MEDICAT_BASE_URL", "http://127.0.0.1:9000/api"), ("MEDICAT_TIMEOUT_SECS", "15")]),
        )
        .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.refresh_path, "/refresh/");
        assert_eq!(config.login_path, DEFAULT_LOGIN_PATH);
        assert_eq!(config.timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(CliConfig::load_with_env(Some(&missing), dir.path(), env(&[])).is_err());
    }

    #[test]
    fn explicit_state_dir_wins() {
        let dir = PathBuf::from("/tmp/medicat-state");
        assert_eq!(state_dir(Some(dir.clone())), dir);
        assert_eq!(credentials_path(&dir), dir.join("credentials.json"));
    }
}
