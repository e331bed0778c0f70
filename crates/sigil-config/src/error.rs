use thiserror::Error;

/// Lookup errors raised when reading a loaded configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `imagegen.provider` is not set
    #[error("No default image generation provider configured")]
    MissingDefault,

    /// No `[imagegen.providers.<name>]` entry exists
    #[error("No configuration found for provider '{name}'")]
    MissingProviderConfig { name: String },

    /// A duration string could not be parsed
    #[error("invalid duration '{value}' for {field}: {reason}")]
    InvalidDuration {
        field: String,
        value: String,
        reason: String,
    },
}

/// Parse a human-readable duration such as "30s" or "1m"
pub(crate) fn parse_duration(field: &str, value: &str) -> Result<std::time::Duration, ConfigError> {
    duration_str::parse(value).map_err(|e| ConfigError::InvalidDuration {
        field: field.to_owned(),
        value: value.to_owned(),
        reason: e.to_string(),
    })
}
