//! Configuration for the assistant
//!
//! Provides centralized configuration for the inference client, the agent
//! loop, the capability tools and the session controller. Values come from
//! built-in defaults, an optional TOML file and a few environment variables.

use crate::{Result, ZarvisError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Environment variable overriding the API base URL
pub const BASE_URL_ENV: &str = "ZARVIS_BASE_URL";

/// Environment variable overriding the reasoning model
pub const MODEL_ENV: &str = "ZARVIS_MODEL";

/// Model used for reasoning and vision
pub const DEFAULT_CHAT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Remote inference API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bearer token for the inference API
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retries after the first attempt (0 = fail on first error)
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries
    pub retry_base_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            request_timeout_secs: 120,
            max_retries: 0,
            retry_base_delay_ms: 1000,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Settings for the reasoning loop
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Chat model used for reasoning
    pub model: String,

    /// Sampling temperature for reasoning
    pub temperature: f32,

    /// Maximum reasoning rounds per turn
    pub max_rounds: usize,

    /// Replaces the built-in system prompt when set
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.7,
            max_rounds: 10,
            system_prompt: None,
        }
    }
}

/// Settings for the capability tools
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub transcription_model: String,
    pub transcription_prompt: String,
    pub vision_model: String,
    pub vision_prompt: String,
    pub vision_max_tokens: u32,
    pub vision_temperature: f32,
    pub speech_model: String,
    pub voice: String,
    pub speech_format: String,

    /// Directory synthesized speech is written into
    pub output_dir: PathBuf,

    /// Base of generated file names when the caller does not pick one;
    /// a unique suffix is added per call
    pub default_output_filename: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            transcription_model: "whisper-large-v3".to_string(),
            transcription_prompt: "Transcribe clearly".to_string(),
            vision_model: DEFAULT_CHAT_MODEL.to_string(),
            vision_prompt: "Describe what you see in this image in detail.".to_string(),
            vision_max_tokens: 1024,
            vision_temperature: 1.0,
            speech_model: "playai-tts".to_string(),
            voice: "Aaliyah-PlayAI".to_string(),
            speech_format: "wav".to_string(),
            output_dir: PathBuf::from("output"),
            default_output_filename: "speech.wav".to_string(),
        }
    }
}

/// Settings for the session controller
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay between playback completion and deleting the speech file
    pub playback_cleanup_delay_ms: u64,

    /// Delay between transcription completion and deleting the recording
    pub recording_cleanup_delay_ms: u64,

    /// Capacity of the session event channel
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            playback_cleanup_delay_ms: 5000,
            recording_cleanup_delay_ms: 2000,
            event_buffer: 100,
        }
    }
}

impl SessionConfig {
    pub fn playback_cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.playback_cleanup_delay_ms)
    }

    pub fn recording_cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.recording_cleanup_delay_ms)
    }
}

/// Configuration for the complete application
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("zarvis").join("config.toml"))
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ZarvisError::Config(e.to_string()))
    }

    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ZarvisError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load the file if it exists, then apply environment overrides
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        Ok(config.with_env())
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply environment overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides from an arbitrary lookup
    pub fn with_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.api.api_key = Some(key);
        }
        if let Some(url) = non_empty(BASE_URL_ENV) {
            self.api.base_url = url;
        }
        if let Some(model) = non_empty(MODEL_ENV) {
            self.agent.model = model;
        }
        self
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api.api_key = Some(key.into());
        self
    }

    /// Set the API base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api.base_url = url.into();
        self
    }

    /// Set the reasoning round bound
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.agent.max_rounds = max_rounds;
        self
    }

    /// Set the speech output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tools.output_dir = dir.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.api.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(ZarvisError::Config(format!(
                    "API key is required (set {} or api.api_key)",
                    API_KEY_ENV
                )))
            }
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(ZarvisError::Config(format!(
                "Base URL must be http(s): {}",
                self.api.base_url
            )));
        }

        if self.agent.max_rounds == 0 {
            return Err(ZarvisError::Config(
                "agent.max_rounds must be at least 1".to_string(),
            ));
        }

        if self.session.event_buffer == 0 {
            return Err(ZarvisError::Config(
                "session.event_buffer must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.agent.max_rounds, 10);
        assert_eq!(config.tools.voice, "Aaliyah-PlayAI");
        assert_eq!(config.tools.transcription_model, "whisper-large-v3");
        assert_eq!(config.api.max_retries, 0);
        assert!(config.api.api_key.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [agent]
            max_rounds = 4

            [tools]
            voice = "Fritz-PlayAI"
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.max_rounds, 4);
        assert_eq!(config.agent.model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.tools.voice, "Fritz-PlayAI");
        assert_eq!(config.tools.speech_model, "playai-tts");
    }

    #[test]
    fn test_invalid_toml() {
        let result = AppConfig::from_toml("[agent\nmax_rounds = ");
        assert!(matches!(result, Err(ZarvisError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::default().with_env_from(|key| match key {
            API_KEY_ENV => Some("gsk_test".to_string()),
            MODEL_ENV => Some("llama-3.3-70b-versatile".to_string()),
            BASE_URL_ENV => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config.api.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(config.agent.model, "llama-3.3-70b-versatile");
        assert_eq!(config.api.base_url, ApiConfig::default().base_url);
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().validate().is_err());

        let config = AppConfig::default().with_api_key("key");
        assert!(config.validate().is_ok());

        assert!(config.clone().with_max_rounds(0).validate().is_err());
        assert!(config.with_base_url("ftp://example.com").validate().is_err());
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.agent.max_rounds, 10);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nplayback_cleanup_delay_ms = 10\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.session.playback_cleanup_delay(), Duration::from_millis(10));
    }
}
