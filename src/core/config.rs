//! Pipeline configuration: generation service credentials, timeouts and
//! data paths. Read from a RON file, the process environment, or both.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_CATALOG_PATH: &str = "data/options_catalog.json";

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const ENV_TIMEOUT_MS: &str = "CAREER_QUEST_TIMEOUT_MS";
pub const ENV_CATALOG: &str = "CAREER_QUEST_CATALOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
    pub request_timeout_ms: u64,
    pub temperature: f32,
    pub catalog_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: DEFAULT_API_VERSION.to_string(),
            deployment: String::new(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            temperature: DEFAULT_TEMPERATURE,
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
        }
    }
}

// The key never reaches logs.
impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("api_version", &self.api_version)
            .field("deployment", &self.deployment)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("temperature", &self.temperature)
            .field("catalog_path", &self.catalog_path)
            .finish()
    }
}

impl PipelineConfig {
    /// Defaults overridden by the environment. A `.env` file in the
    /// working directory is loaded first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a RON config file, then apply environment overrides.
    pub fn load_from_ron(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse_ron(&contents)?;
        dotenvy::dotenv().ok();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn parse_ron(input: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_ENDPOINT) {
            self.endpoint = v;
        }
        if let Some(v) = get(ENV_API_KEY) {
            self.api_key = v;
        }
        if let Some(v) = get(ENV_API_VERSION) {
            self.api_version = v;
        }
        if let Some(v) = get(ENV_DEPLOYMENT) {
            self.deployment = v;
        }
        if let Some(v) = get(ENV_TIMEOUT_MS) {
            self.request_timeout_ms = v.parse().map_err(|e| ConfigError::Invalid {
                key: ENV_TIMEOUT_MS,
                reason: format!("'{}': {}", v, e),
            })?;
        }
        if let Some(v) = get(ENV_CATALOG) {
            self.catalog_path = PathBuf::from(v);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid {
                key: "temperature",
                reason: format!("{} is outside 0.0..=2.0", self.temperature),
            });
        }
        Ok(())
    }

    /// True when endpoint, key and deployment are all set. Without them the
    /// pipeline runs entirely on synthesized content.
    pub fn credentials_present(&self) -> bool {
        [&self.endpoint, &self.api_key, &self.deployment]
            .iter()
            .all(|v| !v.trim().is_empty())
    }

    /// Chat-completions URL for the configured deployment.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}
