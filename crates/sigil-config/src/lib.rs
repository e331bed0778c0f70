#![allow(clippy::must_use_candidate)]

mod env;
mod error;
pub mod imagegen;
pub mod job;
mod loader;
pub mod telemetry;

use serde::Deserialize;

pub use error::ConfigError;
pub use imagegen::*;
pub use job::*;
pub use telemetry::{LogFormat, TelemetryConfig};

/// Top-level Sigil configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Image generation providers and the default provider name
    #[serde(default)]
    pub imagegen: ImageGenConfig,
    /// Prompt template store
    #[serde(default)]
    pub prompts: PromptsConfig,
    /// Blob storage used to resolve opaque reference image keys
    #[serde(default)]
    pub storage: StorageConfig,
    /// Background generation job settings
    #[serde(default)]
    pub job: JobConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
