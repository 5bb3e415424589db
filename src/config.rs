use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable that overrides the configured server URL.
pub const SERVER_URL_ENV: &str = "ACECHAT_URL";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub server_url: Option<String>,
    /// Timeout for new-chat, settings and listen calls. `0` disables it.
    pub request_timeout_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Environment first, then the config file, then the default.
    pub fn server_url(&self) -> String {
        self.resolve_server_url(std::env::var(SERVER_URL_ENV).ok())
    }

    fn resolve_server_url(&self, from_env: Option<String>) -> String {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("acechat")
                .join("acechat.log")
        })
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("acechat").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"server_url": "http://chat.local:8080", "request_timeout_secs": 0}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server_url.as_deref(), Some("http://chat.local:8080"));
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_server_url_precedence() {
        let config = Config {
            server_url: Some("http://from-file:1".to_string()),
            ..Config::new()
        };
        assert_eq!(
            config.resolve_server_url(Some("http://from-env:2".to_string())),
            "http://from-env:2"
        );
        assert_eq!(config.resolve_server_url(Some("  ".to_string())), "http://from-file:1");
        assert_eq!(Config::new().resolve_server_url(None), DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(
            Config::new().request_timeout(),
            Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
        );
    }
}
