// Rubemacro — declarative HTTP macro runner for the Rube automation API
// License: Apache-2.0

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("home directory not found")]
    NoHomeDir,
    #[error("no automation API base URL configured (set RUBE_BASE or api.base_url)")]
    MissingBaseUrl,
    #[error("no automation API auth token configured (set RUBE_AUTH or api.auth_token)")]
    MissingAuthToken,
    #[error("invalid base URL '{0}': {1}")]
    InvalidBaseUrl(String, url::ParseError),
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub macros: MacrosConfig,
    #[serde(default)]
    pub image: ImageConfig,
}

// ---------------------------------------------------------------------------
// Automation API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the automation API, e.g. https://api.rube.app
    #[serde(default)]
    pub base_url: String,
    /// Bearer token sent with every step request.
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_step_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: String::new(),
            timeout_secs: default_step_timeout(),
        }
    }
}

fn default_step_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Macro document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacrosConfig {
    /// Path of the persisted macro document. Seeded with the built-in
    /// default macro on first run if absent.
    #[serde(default = "default_macro_path")]
    pub path: String,
}

impl Default for MacrosConfig {
    fn default() -> Self {
        Self {
            path: default_macro_path(),
        }
    }
}

fn default_macro_path() -> String {
    "macro.json".to_string()
}

// ---------------------------------------------------------------------------
// Image side tool
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// AUTOMATIC1111-compatible endpoint for txt2img.
    #[serde(default = "default_image_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_outputs_dir")]
    pub outputs_dir: String,
    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_image_endpoint(),
            outputs_dir: default_outputs_dir(),
            timeout_secs: default_image_timeout(),
        }
    }
}

fn default_image_endpoint() -> String {
    "http://127.0.0.1:7860".to_string()
}
fn default_outputs_dir() -> String {
    "outputs".to_string()
}
fn default_image_timeout() -> u64 {
    300
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a JSON file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            let mut config = Config::default();
            config.apply_env_overrides();
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// `RUBE_BASE` and `RUBE_AUTH` are the names the Rube tooling already
    /// uses; the rest are prefixed `RUBEMACRO_`.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RUBE_BASE") {
            self.api.base_url = v;
        }
        if let Ok(v) = std::env::var("RUBE_AUTH") {
            self.api.auth_token = v;
        }
        if let Ok(v) = std::env::var("RUBEMACRO_MACRO_PATH") {
            self.macros.path = v;
        }
        if let Ok(v) = std::env::var("RUBEMACRO_IMAGE_ENDPOINT") {
            self.image.endpoint = v;
        }
        if let Ok(v) = std::env::var("RUBEMACRO_IMAGE_OUTPUTS_DIR") {
            self.image.outputs_dir = v;
        }
    }

    /// Get the default config file path: ~/.rubemacro/config.json
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".rubemacro").join("config.json"))
    }

    /// Validate configuration before any HTTP call is attempted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        if self.api.auth_token.is_empty() {
            return Err(ConfigError::MissingAuthToken);
        }
        Url::parse(&self.api.base_url)
            .map_err(|e| ConfigError::InvalidBaseUrl(self.api.base_url.clone(), e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
