use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::imaging::{is_allowed_resolution, PollPolicy, DEFAULT_RESOLUTION};

const APP_DIR: &str = "chatdesk";

pub const ENV_CHAT_API_KEY: &str = "CHATDESK_CHAT_API_KEY";
pub const ENV_SPEECH_API_KEY: &str = "CHATDESK_SPEECH_API_KEY";
pub const ENV_IMAGE_API_KEY: &str = "CHATDESK_IMAGE_API_KEY";
pub const ENV_IMAGE_SECRET_KEY: &str = "CHATDESK_IMAGE_SECRET_KEY";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("Could not find a {0} directory for this platform")]
    NoDirectory(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Stored entries sent as history with each request; 0 sends only the
    /// new message.
    pub context_messages: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mistral.ai/".into(),
            api_key: String::new(),
            model: "pixtral-12b-2409".into(),
            context_messages: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub language: String,
    pub record_seconds: u32,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/".into(),
            api_key: String::new(),
            model: "whisper-1".into(),
            language: "ru-RU".into(),
            record_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageSettings {
    pub endpoint: String,
    pub api_key: String,
    pub secret_key: String,
    pub max_attempts: u32,
    pub poll_interval_secs: u64,
    pub width: u32,
    pub height: u32,
    /// Restrict dimensions to the fixed resolution list.
    pub strict_resolutions: bool,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api-key.fusionbrain.ai/".into(),
            api_key: String::new(),
            secret_key: String::new(),
            max_attempts: 10,
            poll_interval_secs: 10,
            width: DEFAULT_RESOLUTION,
            height: DEFAULT_RESOLUTION,
            strict_resolutions: true,
        }
    }
}

impl ImageSettings {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.max_attempts,
            interval: Duration::from_secs(self.poll_interval_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    pub chat: ChatSettings,
    pub speech: SpeechSettings,
    pub image: ImageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            database_path: None,
            chat: ChatSettings::default(),
            speech: SpeechSettings::default(),
            image: ImageSettings::default(),
        }
    }
}

/// `<config_dir>/chatdesk/settings.toml`
pub fn default_config_path() -> Result<PathBuf, SettingsError> {
    dirs::config_dir()
        .map(|p| p.join(APP_DIR).join("settings.toml"))
        .ok_or(SettingsError::NoDirectory("config"))
}

/// `<data_dir>/chatdesk/chat_history.db`
pub fn default_database_path() -> Result<PathBuf, SettingsError> {
    dirs::data_dir()
        .map(|p| p.join(APP_DIR).join("chat_history.db"))
        .ok_or(SettingsError::NoDirectory("data"))
}

impl Settings {
    /// Load settings from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::info!("Settings: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Overlay credentials from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay credentials from `lookup`; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut String); 4] = [
            (ENV_CHAT_API_KEY, &mut self.chat.api_key),
            (ENV_SPEECH_API_KEY, &mut self.speech.api_key),
            (ENV_IMAGE_API_KEY, &mut self.image.api_key),
            (ENV_IMAGE_SECRET_KEY, &mut self.image.secret_key),
        ];
        for (key, slot) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, endpoint) in [
            ("chat.endpoint", &self.chat.endpoint),
            ("speech.endpoint", &self.speech.endpoint),
            ("image.endpoint", &self.image.endpoint),
        ] {
            url::Url::parse(endpoint).map_err(|e| SettingsError::Invalid {
                field,
                reason: e.to_string(),
            })?;
        }
        if self.image.max_attempts == 0 {
            return Err(SettingsError::Invalid {
                field: "image.maxAttempts",
                reason: "must be at least 1".into(),
            });
        }
        for (field, value) in [("image.width", self.image.width), ("image.height", self.image.height)] {
            let allowed = if self.image.strict_resolutions {
                is_allowed_resolution(value)
            } else {
                value > 0
            };
            if !allowed {
                return Err(SettingsError::Invalid {
                    field,
                    reason: format!("{value} is not an allowed resolution"),
                });
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "requestTimeoutSecs",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured database path, or the platform default.
    pub fn database_path(&self) -> Result<PathBuf, SettingsError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => default_database_path(),
        }
    }
}
