//! Configuration loading, validation, and management for Aftercare.
//!
//! Loads configuration from `aftercare.toml` with environment variable
//! overrides. Validates all settings at load time. The API key is never
//! printed: `Debug` redacts it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The root configuration structure.
///
/// Maps directly to `aftercare.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Model backend configuration.
    #[serde(default)]
    pub model: ModelConfig,

    /// Safety validator thresholds.
    #[serde(default)]
    pub safety: SafetyConfig,
}

/// Generative model backend settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key for the model backend. `None` means the AI features are
    /// unavailable; operations surface `ServiceUnavailable` at call time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for instruction synthesis.
    #[serde(default = "default_synthesis_temperature")]
    pub synthesis_temperature: f32,

    /// Temperature for Q&A (lower for more consistent answers).
    #[serde(default = "default_qa_temperature")]
    pub qa_temperature: f32,

    /// Max tokens for a synthesized document.
    #[serde(default = "default_synthesis_max_tokens")]
    pub synthesis_max_tokens: u32,

    /// Max tokens for a Q&A answer.
    #[serde(default = "default_qa_max_tokens")]
    pub qa_max_tokens: u32,

    /// Timeout applied to every generation call, in seconds. A timeout
    /// surfaces as `ServiceUnavailable`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            synthesis_temperature: default_synthesis_temperature(),
            qa_temperature: default_qa_temperature(),
            synthesis_max_tokens: default_synthesis_max_tokens(),
            qa_max_tokens: default_qa_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Safety validator thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Records at or above this severity must carry a non-empty
    /// warning-signs section ("low" | "moderate" | "high" | "critical").
    #[serde(default = "default_warning_severity")]
    pub warning_signs_severity: String,

    /// Confidence floor below which answers are flagged low-confidence.
    #[serde(default = "default_low_confidence")]
    pub low_confidence_threshold: f64,

    /// Confidence ceiling for answers with zero grounding sources.
    #[serde(default = "default_ungrounded_ceiling")]
    pub ungrounded_confidence_ceiling: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            warning_signs_severity: default_warning_severity(),
            low_confidence_threshold: default_low_confidence(),
            ungrounded_confidence_ceiling: default_ungrounded_ceiling(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "meta-llama/llama-3.2-3b-instruct:free".into()
}
fn default_synthesis_temperature() -> f32 {
    0.3
}
fn default_qa_temperature() -> f32 {
    0.2
}
fn default_synthesis_max_tokens() -> u32 {
    2000
}
fn default_qa_max_tokens() -> u32 {
    1000
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_warning_severity() -> String {
    "high".into()
}
fn default_low_confidence() -> f64 {
    0.4
}
fn default_ungrounded_ceiling() -> f64 {
    0.35
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("synthesis_temperature", &self.synthesis_temperature)
            .field("qa_temperature", &self.qa_temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("safety", &self.safety)
            .finish()
    }
}

/// Errors during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load from `aftercare.toml` in the working directory with environment
    /// variable overrides (highest priority).
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("aftercare.toml"))?;

        if config.model.api_key.is_none() {
            config.model.api_key = std::env::var("AFTERCARE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("AFTERCARE_BASE_URL") {
            config.model.base_url = url;
        }

        if let Ok(model) = std::env::var("AFTERCARE_MODEL") {
            config.model.model = model;
        }

        Ok(config)
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.synthesis_temperature) {
            return Err(ConfigError::Invalid(format!(
                "synthesis_temperature must be in [0.0, 2.0], got {}",
                self.model.synthesis_temperature
            )));
        }
        if !(0.0..=2.0).contains(&self.model.qa_temperature) {
            return Err(ConfigError::Invalid(format!(
                "qa_temperature must be in [0.0, 2.0], got {}",
                self.model.qa_temperature
            )));
        }
        if self.model.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.safety.low_confidence_threshold) {
            return Err(ConfigError::Invalid(
                "low_confidence_threshold must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.safety.ungrounded_confidence_ceiling) {
            return Err(ConfigError::Invalid(
                "ungrounded_confidence_ceiling must be in [0, 1]".into(),
            ));
        }
        self.safety.warning_severity().map(|_| ()).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "warning_signs_severity must be one of low/moderate/high/critical, got {}",
                self.safety.warning_signs_severity
            ))
        })
    }
}

impl SafetyConfig {
    /// Parse the configured severity threshold.
    pub fn warning_severity(&self) -> Option<aftercare_core::Severity> {
        match self.warning_signs_severity.as_str() {
            "low" => Some(aftercare_core::Severity::Low),
            "moderate" => Some(aftercare_core::Severity::Moderate),
            "high" => Some(aftercare_core::Severity::High),
            "critical" => Some(aftercare_core::Severity::Critical),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.timeout_secs, 60);
        assert_eq!(
            config.safety.warning_severity(),
            Some(aftercare_core::Severity::High)
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/aftercare.toml")).unwrap();
        assert!(config.model.api_key.is_none());
        assert_eq!(config.model.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn parses_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[model]\nmodel = \"test-model\"\ntimeout_secs = 15\n\n[safety]\nwarning_signs_severity = \"moderate\""
        )
        .unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.model.model, "test-model");
        assert_eq!(config.model.timeout_secs, 15);
        assert_eq!(
            config.safety.warning_severity(),
            Some(aftercare_core::Severity::Moderate)
        );
        // Untouched fields keep defaults
        assert!((config.model.qa_temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_severity_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[safety]\nwarning_signs_severity = \"fatal\"").unwrap();
        assert!(AppConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            model: ModelConfig {
                api_key: Some("sk-secret".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
