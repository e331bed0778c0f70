use std::{path::PathBuf, time::Duration};

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::{ConfigError, parse_duration};

/// Image generation configuration: the default provider and per-provider settings
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageGenConfig {
    /// Name of the provider used when a request does not override it
    #[serde(default)]
    pub provider: Option<String>,
    /// Provider settings keyed by provider name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
}

impl ImageGenConfig {
    /// Name of the default provider
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingDefault` if no default is configured
    pub fn default_provider_name(&self) -> Result<&str, ConfigError> {
        self.provider
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::MissingDefault)
    }

    /// Settings for the named provider
    ///
    /// The lookup is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingProviderConfig` if there is no entry for `name`
    pub fn provider_config(&self, name: &str) -> Result<&ProviderConfig, ConfigError> {
        self.providers
            .get(&normalize_name(name))
            .ok_or_else(|| ConfigError::MissingProviderConfig { name: name.to_owned() })
    }

    /// Normalize provider names so lookups do not depend on how the file spelled them
    pub(crate) fn normalize(&mut self) {
        self.provider = self.provider.take().map(|name| normalize_name(&name));
        self.providers = std::mem::take(&mut self.providers)
            .into_iter()
            .map(|(name, config)| (normalize_name(&name), config))
            .collect();
    }
}

/// Canonical form of a provider name
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Settings for a single image generation provider
///
/// Fields that a provider does not understand are ignored by that provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Endpoint override
    #[serde(default)]
    pub endpoint: Option<Url>,
    /// Model identifier
    pub model: String,
    /// Gemini `generationConfig` block, passed through verbatim
    #[serde(default)]
    pub generation_config: Option<serde_json::Value>,
    /// Gemini `safetySettings` list, passed through verbatim
    #[serde(default)]
    pub safety_settings: Option<Vec<serde_json::Value>>,
    /// `OpenAI` response format ("url" or "`b64_json`")
    #[serde(default)]
    pub response_format: Option<String>,
    /// `OpenAI` image size (e.g. "1024x1024")
    #[serde(default)]
    pub size: Option<String>,
    /// `OpenAI` image quality
    #[serde(default)]
    pub quality: Option<String>,
    /// `OpenAI` background ("transparent", "opaque", "auto")
    #[serde(default)]
    pub background: Option<String>,
    /// `OpenAI` style
    #[serde(default)]
    pub style: Option<String>,
    /// Number of images to request
    #[serde(default)]
    pub n: Option<u32>,
    /// End-user identifier forwarded to `OpenAI`
    #[serde(default)]
    pub user: Option<String>,
    /// Overall request timeout (e.g. "30s")
    #[serde(default)]
    pub request_timeout: Option<String>,
    /// Connect timeout (e.g. "10s")
    #[serde(default)]
    pub connect_timeout: Option<String>,
    /// Resends after a timeout or connection failure (default 2)
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Wait before the first resend, doubled for each one after (e.g. "250ms")
    #[serde(default)]
    pub retry_interval: Option<String>,
}

impl ProviderConfig {
    /// Parsed overall request timeout, if configured
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDuration` if the value does not parse
    pub fn request_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.request_timeout
            .as_deref()
            .map(|value| parse_duration("request_timeout", value))
            .transpose()
    }

    /// Parsed connect timeout, if configured
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDuration` if the value does not parse
    pub fn connect_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.connect_timeout
            .as_deref()
            .map(|value| parse_duration("connect_timeout", value))
            .transpose()
    }

    /// Parsed initial resend interval, if configured
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDuration` if the value does not parse
    pub fn retry_interval(&self) -> Result<Option<Duration>, ConfigError> {
        self.retry_interval
            .as_deref()
            .map(|value| parse_duration("retry_interval", value))
            .transpose()
    }
}

/// Prompt template store
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptsConfig {
    /// Directory holding `<template>.toml` files
    #[serde(default = "default_prompts_directory")]
    pub directory: PathBuf,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            directory: default_prompts_directory(),
        }
    }
}

fn default_prompts_directory() -> PathBuf {
    PathBuf::from("prompts")
}

/// Blob storage for opaque reference image keys
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory that reference keys are resolved against
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn provider_config_returns_entry() {
        let toml = r#"
            provider = "gemini"

            [providers.gemini]
            api_key = "test_key"
            endpoint = "https://api.example.com/"
            model = "gemini-2.0"
        "#;

        let config: ImageGenConfig = toml::from_str(toml).unwrap();
        let gemini = config.provider_config("gemini").unwrap();

        assert_eq!(gemini.api_key.as_ref().unwrap().expose_secret(), "test_key");
        assert_eq!(gemini.endpoint.as_ref().unwrap().as_str(), "https://api.example.com/");
        assert_eq!(gemini.model, "gemini-2.0");
    }

    #[test]
    fn missing_provider_config() {
        let config: ImageGenConfig = toml::from_str(r#"provider = "gemini""#).unwrap();

        let err = config.provider_config("unknown").unwrap_err();

        assert_eq!(err, ConfigError::MissingProviderConfig { name: "unknown".to_owned() });
        assert_eq!(err.to_string(), "No configuration found for provider 'unknown'");
    }

    #[test]
    fn missing_default_provider() {
        let config = ImageGenConfig::default();
        assert_eq!(config.default_provider_name(), Err(ConfigError::MissingDefault));

        let blank: ImageGenConfig = toml::from_str(r#"provider = "  ""#).unwrap();
        assert_eq!(blank.default_provider_name(), Err(ConfigError::MissingDefault));
    }

    #[test]
    fn normalize_lowercases_names() {
        let toml = r#"
            provider = " Gemini "

            [providers.GEMINI]
            model = "gemini-2.0"
        "#;

        let mut config: ImageGenConfig = toml::from_str(toml).unwrap();
        config.normalize();

        assert_eq!(config.default_provider_name().unwrap(), "gemini");
        assert!(config.provider_config("Gemini").is_ok());
    }

    #[test]
    fn generation_config_passes_through_as_json() {
        let toml = r#"
            [providers.gemini]
            model = "gemini-2.0"
            generation_config = { temperature = 0.2 }
            safety_settings = [{ category = "HARM_CATEGORY_HATE", threshold = "BLOCK_NONE" }]
        "#;

        let config: ImageGenConfig = toml::from_str(toml).unwrap();
        let gemini = config.provider_config("gemini").unwrap();

        assert_eq!(gemini.generation_config, Some(serde_json::json!({ "temperature": 0.2 })));
        assert_eq!(gemini.safety_settings.as_ref().unwrap()[0]["category"], "HARM_CATEGORY_HATE");
    }

    #[test]
    fn timeouts_parse() {
        let config = ProviderConfig {
            model: "gpt-image-1".to_owned(),
            request_timeout: Some("45s".to_owned()),
            connect_timeout: Some("bogus".to_owned()),
            retry_interval: Some("250ms".to_owned()),
            ..ProviderConfig::default()
        };

        assert_eq!(config.request_timeout().unwrap(), Some(Duration::from_secs(45)));
        assert_eq!(config.retry_interval().unwrap(), Some(Duration::from_millis(250)));
        assert!(matches!(
            config.connect_timeout(),
            Err(ConfigError::InvalidDuration { ref field, .. }) if field == "connect_timeout"
        ));
    }
}
