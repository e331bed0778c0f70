use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if
    /// [`Config::from_toml`] rejects its contents
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// Expands `{{ env.VAR }}` placeholders, deserializes, normalizes
    /// provider names, then validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if variable expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let mut config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.imagegen.normalize();
        config.validate()?;

        tracing::debug!(
            default_provider = config.imagegen.provider.as_deref().unwrap_or("<unset>"),
            providers = config.imagegen.providers.len(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the default provider has no settings, a duration
    /// does not parse, or the job would never run
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_imagegen()?;
        self.validate_job()?;
        Ok(())
    }

    fn validate_imagegen(&self) -> anyhow::Result<()> {
        if let Ok(name) = self.imagegen.default_provider_name()
            && self.imagegen.provider_config(name).is_err()
        {
            anyhow::bail!("default provider '{name}' has no [imagegen.providers.{name}] section");
        }

        for (name, provider) in &self.imagegen.providers {
            if provider.model.trim().is_empty() {
                anyhow::bail!("provider '{name}' must set a model");
            }
            provider
                .request_timeout()
                .map_err(|e| anyhow::anyhow!("provider '{name}': {e}"))?;
            provider
                .connect_timeout()
                .map_err(|e| anyhow::anyhow!("provider '{name}': {e}"))?;
        }

        Ok(())
    }

    fn validate_job(&self) -> anyhow::Result<()> {
        if self.job.max_attempts == 0 {
            anyhow::bail!("job.max_attempts must be at least 1");
        }

        self.job.base_delay()?;

        Ok(())
    }
}
