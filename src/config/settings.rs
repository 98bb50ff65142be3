//! Configuration settings for the nltype pipeline.

use crate::error::{ConfigError, Result};
use crate::oracle::{ResponsivenessLevel, StageSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub oracle: OracleConfig,
    pub annotator: AnnotatorConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("nltype.toml"),
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .map(|p| p.join("nltype/config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".nltype/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.oracle.base_url {
            if base_url.trim().is_empty() {
                return Err(ConfigError::MissingField("oracle.base_url".to_string()).into());
            }
        }
        if self.oracle.model.trim().is_empty() {
            return Err(ConfigError::MissingField("oracle.model".to_string()).into());
        }
        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::Invalid("oracle.timeout_secs must be > 0".to_string()).into());
        }
        if self.annotator.max_context_chars == 0 {
            return Err(
                ConfigError::Invalid("annotator.max_context_chars must be > 0".to_string()).into(),
            );
        }
        if self.pipeline.concurrency == 0 {
            return Err(ConfigError::Invalid("pipeline.concurrency must be > 0".to_string()).into());
        }
        Ok(())
    }
}

/// Oracle provider enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleProvider {
    Gemini,
    #[serde(alias = "open_ai")]
    OpenAi,
}

impl OracleProvider {
    fn default_base_url(&self) -> &'static str {
        match self {
            OracleProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            OracleProvider::OpenAi => "https://api.openai.com/v1",
        }
    }
}

/// Oracle configuration, shared by every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Provider type: "gemini" or "openai"
    pub provider: OracleProvider,
    /// Base URL override (provider default when unset)
    pub base_url: Option<String>,
    /// Model/version selector
    pub model: String,
    /// API key (loaded from environment if not set)
    pub api_key: Option<String>,
    /// Responsiveness/effort level
    pub level: ResponsivenessLevel,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OracleConfig {
    /// The configured base URL, or the provider's default.
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }
}

impl From<&OracleConfig> for StageSettings {
    fn from(config: &OracleConfig) -> Self {
        StageSettings::new(config.model.clone(), config.level)
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: OracleProvider::Gemini,
            base_url: None,
            model: "gemini-3-flash-preview".to_string(),
            api_key: None,
            level: ResponsivenessLevel::Low,
            timeout_secs: 120,
        }
    }
}

/// Annotator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Revision context longer than this is truncated
    pub max_context_chars: usize,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 2000,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of independent runs in flight during batch checks
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.oracle.provider, OracleProvider::Gemini);
        assert_eq!(config.oracle.model, "gemini-3-flash-preview");
        assert_eq!(config.oracle.level, ResponsivenessLevel::Low);
        assert_eq!(
            config.oracle.base_url(),
            "https://generativelanguage.googleapis.com/v1beta"
        );
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [oracle]
            provider = "openai"
            model = "gpt-5-mini"
            level = "medium"
            timeout_secs = 30

            [annotator]
            max_context_chars = 500

            [pipeline]
            concurrency = 8
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.oracle.provider, OracleProvider::OpenAi);
        assert_eq!(config.oracle.level, ResponsivenessLevel::Medium);
        assert_eq!(config.oracle.base_url(), "https://api.openai.com/v1");
        assert_eq!(config.annotator.max_context_chars, 500);
        assert_eq!(config.pipeline.concurrency, 8);
    }

    #[test]
    fn test_validate_empty_base_url() {
        let toml = r#"
            [oracle]
            base_url = ""
        "#;

        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_validate_empty_model() {
        let toml = r#"
            [oracle]
            model = " "
        "#;

        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let toml = r#"
            [pipeline]
            concurrency = 0
        "#;

        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_invalid_level_rejected() {
        let toml = r#"
            [oracle]
            level = "extreme"
        "#;

        assert!(Config::from_str(toml).is_err());
    }
}
