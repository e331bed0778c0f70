use std::{str::FromStr, sync::Arc};

use dashmap::DashMap;
use sigil_config::{ImageGenConfig, normalize_name};

use crate::{
    error::{ImageGenError, Result},
    provider::{ImageProvider, ProviderKind, gemini::GeminiProvider, openai::OpenAiProvider},
};

/// Builds provider adapters on first use and caches them by name
pub struct ProviderRegistry {
    config: Arc<ImageGenConfig>,
    providers: DashMap<String, Arc<dyn ImageProvider>>,
}

impl ProviderRegistry {
    pub fn new(config: Arc<ImageGenConfig>) -> Self {
        Self {
            config,
            providers: DashMap::new(),
        }
    }

    /// Registry pre-populated with already-built adapters
    ///
    /// Injected names bypass construction and name validation.
    pub fn with_providers<I, S>(config: Arc<ImageGenConfig>, providers: I) -> Self
    where
        I: IntoIterator<Item = (S, Arc<dyn ImageProvider>)>,
        S: AsRef<str>,
    {
        let registry = Self::new(config);
        for (name, provider) in providers {
            registry.providers.insert(normalize_name(name.as_ref()), provider);
        }
        registry
    }

    /// Adapter for the configured default provider
    pub fn resolve_default(&self) -> Result<Arc<dyn ImageProvider>> {
        let name = self.config.default_provider_name()?;
        self.resolve(name)
    }

    /// Adapter for the named provider, built on first use
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ImageProvider>> {
        let key = normalize_name(name);

        if let Some(provider) = self.providers.get(&key) {
            return Ok(Arc::clone(provider.value()));
        }

        let kind = ProviderKind::from_str(&key).map_err(|_| ImageGenError::UnknownProvider(key.clone()))?;
        let config = self.config.provider_config(&key)?;

        let built: Arc<dyn ImageProvider> = match kind {
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(config)?),
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config)?),
        };

        tracing::debug!(provider = %key, model = %config.model, "image generation provider initialized");

        // A concurrent resolution may have inserted first; that instance wins
        let provider = self.providers.entry(key).or_insert(built);
        Ok(Arc::clone(provider.value()))
    }
}
