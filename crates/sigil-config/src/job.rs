use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::error::{ConfigError, parse_duration};

/// Background image generation job settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Prompt template rendered for each entity
    #[serde(default = "default_template")]
    pub template: String,
    /// Total attempts for transient failures, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each attempt after that
    #[serde(default = "default_base_delay")]
    pub base_delay: String,
    /// Directory scanned for local reference images
    #[serde(default)]
    pub reference_directory: Option<PathBuf>,
    /// Maximum number of local reference images attached per request
    #[serde(default = "default_reference_limit")]
    pub reference_limit: usize,
}

impl JobConfig {
    /// Parsed base retry delay
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDuration` if `base_delay` does not parse
    pub fn base_delay(&self) -> Result<Duration, ConfigError> {
        parse_duration("job.base_delay", &self.base_delay)
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            reference_directory: None,
            reference_limit: default_reference_limit(),
        }
    }
}

fn default_template() -> String {
    "avatar".to_owned()
}

const fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> String {
    "5s".to_owned()
}

const fn default_reference_limit() -> usize {
    3
}
