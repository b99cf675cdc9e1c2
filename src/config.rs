//! Configuration management for medocr using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default rendering resolution for the enhanced path.
pub const DEFAULT_DPI: u32 = 300;

/// Default page ceiling for the enhanced path.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Default wall-clock budget for one pipeline run.
pub const DEFAULT_PIPELINE_TIMEOUT_SECS: u64 = 600;

/// External OCR service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrApiConfig {
    /// Service endpoint, e.g. `https://<resource>.cognitiveservices.azure.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Subscription key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model to analyze with.
    #[serde(default = "default_model")]
    pub model: String,
    /// API version query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Delay between result polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum number of result polls before giving up.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

fn default_model() -> String {
    "prebuilt-read".to_string()
}

fn default_api_version() -> String {
    "2024-11-30".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_polls() -> u32 {
    120
}

impl Default for OcrApiConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl OcrApiConfig {
    /// Base default without env overrides.
    fn base_default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: default_model(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }

    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `OCR_ENDPOINT`: service endpoint
    /// - `OCR_API_KEY`: subscription key
    /// - `OCR_MODEL`: model id
    /// - `OCR_API_VERSION`: API version
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(endpoint) = non_empty_env("OCR_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(key) = non_empty_env("OCR_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty_env("OCR_MODEL") {
            self.model = model;
        }
        if let Some(version) = non_empty_env("OCR_API_VERSION") {
            self.api_version = version;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rendering resolution for the enhanced path.
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Only the first `max_pages` pages are rendered and re-OCRed.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Wall-clock budget for one run, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_dpi() -> u32 {
    DEFAULT_DPI
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

/// Page ceilings can be lowered but never raised past the default.
pub fn clamp_max_pages(pages: u32) -> u32 {
    pages.clamp(1, DEFAULT_MAX_PAGES)
}

fn default_timeout_secs() -> u64 {
    DEFAULT_PIPELINE_TIMEOUT_SECS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl PipelineConfig {
    fn base_default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            max_pages: DEFAULT_MAX_PAGES,
            timeout_secs: DEFAULT_PIPELINE_TIMEOUT_SECS,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars: `MEDOCR_DPI`, `MEDOCR_MAX_PAGES`, `MEDOCR_TIMEOUT_SECS`.
    /// Unparseable values are ignored. The page ceiling is clamped to
    /// `1..=DEFAULT_MAX_PAGES` whatever its source.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dpi) = parsed_env::<u32>("MEDOCR_DPI").filter(|d| *d > 0) {
            self.dpi = dpi;
        }
        if let Some(pages) = parsed_env::<u32>("MEDOCR_MAX_PAGES") {
            self.max_pages = pages;
        }
        self.max_pages = clamp_max_pages(self.max_pages);
        if let Some(secs) = parsed_env::<u64>("MEDOCR_TIMEOUT_SECS") {
            self.timeout_secs = secs;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    non_empty_env(name).and_then(|v| v.trim().parse().ok())
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// External OCR service.
    #[serde(default, skip_serializing_if = "OcrApiConfig::is_default")]
    pub ocr: OcrApiConfig,
    /// Pipeline tuning.
    #[serde(default, skip_serializing_if = "PipelineConfig::is_default")]
    pub pipeline: PipelineConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers medocr config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("medocr").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring unreadable config: {}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            // No config file found, use defaults with env overrides
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let config: Config = match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        // File values first, then env wins
        Ok(Config {
            ocr: config.ocr.with_env_overrides(),
            pipeline: config.pipeline.with_env_overrides(),
            source_path: None,
        })
    }
}
