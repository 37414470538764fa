use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

use crate::processing::tokenizer::DEFAULT_ENCODING;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the cell preparation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Tokenizer encoding or model name used to measure content.
    pub tokenizer: String,
    /// Optional ceiling applied to every cell's `FixedTokenCount`.
    pub max_chunk_tokens: Option<usize>,
    /// Backend used to generate summaries.
    pub completion_provider: CompletionProvider,
    /// Base URL of the completion backend; provider default when absent.
    pub completion_url: Option<String>,
    /// Bearer token sent to the completion backend.
    pub completion_api_key: Option<String>,
    /// Default model passed to the completion backend.
    pub completion_model: Option<String>,
    /// Log file appended to in addition to stderr.
    pub log_file: Option<PathBuf>,
}

/// Supported completion backends for summarization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompletionProvider {
    /// Summarization disabled.
    #[default]
    None,
    /// Local Ollama runtime.
    Ollama,
    /// OpenAI-compatible chat completions API.
    OpenAI,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tokenizer: DEFAULT_ENCODING.to_string(),
            max_chunk_tokens: None,
            completion_provider: CompletionProvider::None,
            completion_url: None,
            completion_api_key: None,
            completion_model: None,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let max_chunk_tokens = optional("SEMCELL_MAX_CHUNK_TOKENS")
            .map(|value| match value.trim().parse::<usize>() {
                Ok(parsed) if parsed > 0 => Ok(parsed),
                _ => Err(ConfigError::InvalidValue("SEMCELL_MAX_CHUNK_TOKENS".into())),
            })
            .transpose()?;

        let completion_provider = match optional("SEMCELL_COMPLETION_PROVIDER") {
            Some(value) => value.parse().map_err(|()| {
                ConfigError::InvalidValue("SEMCELL_COMPLETION_PROVIDER".to_string())
            })?,
            None => CompletionProvider::None,
        };

        let config = Self {
            tokenizer: optional("SEMCELL_TOKENIZER")
                .unwrap_or_else(|| DEFAULT_ENCODING.to_string()),
            max_chunk_tokens,
            completion_provider,
            completion_url: optional("SEMCELL_COMPLETION_URL"),
            completion_api_key: optional("SEMCELL_COMPLETION_API_KEY"),
            completion_model: optional("SEMCELL_COMPLETION_MODEL"),
            log_file: optional("SEMCELL_LOG_FILE").map(PathBuf::from),
        };

        if config.completion_provider == CompletionProvider::OpenAI
            && config.completion_url.is_none()
            && config.completion_api_key.is_none()
        {
            return Err(ConfigError::MissingVariable(
                "SEMCELL_COMPLETION_API_KEY".to_string(),
            ));
        }

        Ok(config)
    }
}

impl std::str::FromStr for CompletionProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, falling back to defaults when uninitialized.
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

/// Load configuration from the environment (and `.env`) and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        tokenizer = %config.tokenizer,
        max_chunk_tokens = ?config.max_chunk_tokens,
        completion_provider = ?config.completion_provider,
        completion_model = ?config.completion_model,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, Config::default());
        assert_eq!(config.tokenizer, "cl100k_base");
    }

    #[test]
    fn reads_completion_settings() {
        let config = Config::from_lookup(lookup(&[
            ("SEMCELL_TOKENIZER", "o200k_base"),
            ("SEMCELL_MAX_CHUNK_TOKENS", "512"),
            ("SEMCELL_COMPLETION_PROVIDER", "Ollama"),
            ("SEMCELL_COMPLETION_URL", "http://localhost:11434"),
            ("SEMCELL_COMPLETION_MODEL", "llama3.2"),
            ("SEMCELL_COMPLETION_API_KEY", "  "),
            ("SEMCELL_LOG_FILE", "/tmp/semcell/run.log"),
        ]))
        .expect("config");

        assert_eq!(config.tokenizer, "o200k_base");
        assert_eq!(config.max_chunk_tokens, Some(512));
        assert_eq!(config.completion_provider, CompletionProvider::Ollama);
        assert_eq!(config.completion_url.as_deref(), Some("http://localhost:11434"));
        assert_eq!(config.completion_model.as_deref(), Some("llama3.2"));
        assert_eq!(config.completion_api_key, None);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/semcell/run.log")));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("SEMCELL_MAX_CHUNK_TOKENS", "lots")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("SEMCELL_MAX_CHUNK_TOKENS", "0")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("SEMCELL_COMPLETION_PROVIDER", "bard")])),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn hosted_openai_requires_a_key() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("SEMCELL_COMPLETION_PROVIDER", "openai")])),
            Err(ConfigError::MissingVariable(_))
        ));
        let self_hosted = Config::from_lookup(lookup(&[
            ("SEMCELL_COMPLETION_PROVIDER", "openai"),
            ("SEMCELL_COMPLETION_URL", "http://vllm.local:8000"),
        ]))
        .expect("config");
        assert_eq!(self_hosted.completion_provider, CompletionProvider::OpenAI);
    }
}
