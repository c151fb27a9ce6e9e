use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const REPORT_FILE_NAME: &str = "MIRI_Legal_Report.txt";

pub const ENV_API_URL: &str = "MIRI_API_URL";
pub const ENV_RESPONSE_MODE: &str = "MIRI_RESPONSE_MODE";
pub const ENV_EXPORT_DIR: &str = "MIRI_EXPORT_DIR";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid base url '{value}': expected http:// or https://")]
    InvalidBaseUrl { value: String },

    #[error("unknown response mode '{value}': expected 'streaming' or 'buffered'")]
    UnknownResponseMode { value: String },

    #[error("timeout must be at least one second")]
    ZeroTimeout,

    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}

/// How the analysis endpoint answers. Chosen explicitly, never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Newline-delimited JSON envelopes.
    #[default]
    Streaming,
    /// A single JSON `AnalysisResult` body.
    Buffered,
}

impl ResponseMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "streaming" | "stream" => Ok(Self::Streaming),
            "buffered" | "json" => Ok(Self::Buffered),
            _ => Err(ConfigError::UnknownResponseMode {
                value: value.to_string(),
            }),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Buffered => "buffered",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub export: ExportConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub response_mode: ResponseMode,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            response_mode: ResponseMode::Streaming,
        }
    }
}

impl ApiConfig {
    pub fn analyze_url(&self) -> String {
        format!("{}/analyze", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: Option<PathBuf>,
}

impl ExportConfig {
    pub fn report_path(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(REPORT_FILE_NAME)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct UiConfig {
    pub theme: Option<String>,
}

impl Config {
    /// Applies environment overrides. `lookup` is injected so callers and
    /// tests decide where values come from.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(mode) = lookup(ENV_RESPONSE_MODE).filter(|v| !v.trim().is_empty()) {
            self.api.response_mode = ResponseMode::parse(&mode)?;
        }
        if let Some(dir) = lookup(ENV_EXPORT_DIR).filter(|v| !v.trim().is_empty()) {
            self.export.output_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl {
                value: self.api.base_url.clone(),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
