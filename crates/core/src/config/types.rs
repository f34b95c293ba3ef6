use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use super::ConfigError;
use crate::catalog::DiscogsConfig;
use crate::llm::{GeminiClient, LlmClient, OllamaClient};
use crate::ranking::VariantRankerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub discogs: DiscogsConfig,
    #[serde(default)]
    pub ranker: RankerConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Config {
    /// Validate the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discogs.token.is_empty() {
            return Err(ConfigError::ValidationError(
                "discogs.token is required".to_string(),
            ));
        }
        if self.discogs.requests_per_minute == 0 {
            return Err(ConfigError::ValidationError(
                "discogs.requests_per_minute cannot be 0".to_string(),
            ));
        }
        if self.llm.provider == LlmProvider::Gemini && self.llm.api_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.api_key is required for the gemini provider".to_string(),
            ));
        }
        if self.ranker.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "ranker.max_results cannot be 0".to_string(),
            ));
        }
        if self.ranker.max_candidates == 0 {
            return Err(ConfigError::ValidationError(
                "ranker.max_candidates cannot be 0".to_string(),
            ));
        }
        for (name, weight) in [
            ("ranker.basic_weight", self.ranker.basic_weight),
            ("ranker.variant_weight", self.ranker.variant_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Completion model providers
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[default]
    Gemini,
    Ollama,
}

/// Completion model configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (required for gemini, unused for ollama).
    #[serde(default)]
    pub api_key: String,
    /// Base URL override (e.g., a remote Ollama server).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            api_key: String::new(),
            base_url: None,
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

impl LlmConfig {
    /// Build the configured completion client.
    pub fn build_client(&self) -> Result<Arc<dyn LlmClient>, ConfigError> {
        match self.provider {
            LlmProvider::Gemini => {
                if self.api_key.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "llm.api_key is required for the gemini provider".to_string(),
                    ));
                }
                let mut client = GeminiClient::new(&self.api_key, &self.model);
                if let Some(base_url) = &self.base_url {
                    client = client.with_api_base(base_url);
                }
                Ok(Arc::new(client))
            }
            LlmProvider::Ollama => {
                let mut client = OllamaClient::new(&self.model);
                if let Some(base_url) = &self.base_url {
                    client = client.with_api_base(base_url);
                }
                Ok(Arc::new(client))
            }
        }
    }
}

/// Ranking configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankerConfig {
    /// Maximum candidates sent to the model.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Maximum results returned.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Weight of the field-matching score.
    #[serde(default = "default_basic_weight")]
    pub basic_weight: f32,
    /// Weight of the model's variant score.
    #[serde(default = "default_variant_weight")]
    pub variant_weight: f32,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            max_results: default_max_results(),
            basic_weight: default_basic_weight(),
            variant_weight: default_variant_weight(),
        }
    }
}

fn default_max_candidates() -> usize {
    20
}

fn default_max_results() -> usize {
    10
}

fn default_basic_weight() -> f32 {
    0.6
}

fn default_variant_weight() -> f32 {
    0.4
}

impl From<&RankerConfig> for VariantRankerConfig {
    fn from(config: &RankerConfig) -> Self {
        VariantRankerConfig {
            max_candidates: config.max_candidates,
            max_results: config.max_results,
            basic_weight: config.basic_weight,
            variant_weight: config.variant_weight,
            ..VariantRankerConfig::default()
        }
    }
}

/// Batch store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_path")]
    pub path: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            path: default_batch_path(),
        }
    }
}

fn default_batch_path() -> PathBuf {
    PathBuf::from("cratedigger.db")
}
