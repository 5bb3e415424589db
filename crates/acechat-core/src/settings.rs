use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_MODEL: &str = "gemma:2b";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: i64 = 250;

/// Models offered by the settings picker. The current model is always
/// offered as well, even if it is not in this list.
pub const KNOWN_MODELS: [&str; 5] = ["gemma:2b", "gemma3:latest", "llama3.2", "mistral", "phi3"];

/// Generation settings, mirrored to the server and to local storage.
///
/// Numeric fields are not validated: input that does not parse is kept as
/// `None` and goes over the wire as `null`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    pub model: String,
    pub temperature: Option<f64>,
    #[serde(rename = "num_predict")]
    pub max_tokens: Option<i64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }
}

impl Settings {
    /// Build settings from raw form input, the way a browser form would:
    /// unparsable numbers become `None`.
    pub fn from_form(model: &str, temperature: &str, max_tokens: &str) -> Self {
        Self {
            model: model.to_string(),
            temperature: temperature.trim().parse::<f64>().ok().filter(|t| t.is_finite()),
            max_tokens: max_tokens.trim().parse::<i64>().ok(),
        }
    }
}

/// Stored settings may be partial; missing fields fall back to defaults.
#[derive(Deserialize, Default)]
struct StoredSettings {
    model: Option<String>,
    temperature: Option<f64>,
    num_predict: Option<i64>,
}

/// Durable client-side copy of the last saved settings (one JSON document).
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/acechat/settings.json`
    pub fn default_location() -> Result<Self> {
        let config_dir = dirs::config_dir().ok_or(Error::NoConfigDir)?;
        Ok(Self::new(config_dir.join("acechat").join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved settings, or defaults if nothing has been saved yet.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let stored: StoredSettings = serde_json::from_str(&content)?;
        let defaults = Settings::default();
        Ok(Settings {
            model: stored.model.unwrap_or(defaults.model),
            temperature: stored.temperature.or(defaults.temperature),
            max_tokens: stored.num_predict.or(defaults.max_tokens),
        })
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, content)?;
        debug!(path = %self.path.display(), model = %settings.model, "settings stored");
        Ok(())
    }
}
