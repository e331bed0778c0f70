use std::path::PathBuf;

use sigil_config::ConfigError;
use thiserror::Error;

use crate::provider::ProviderKind;

pub type Result<T> = std::result::Result<T, ImageGenError>;

/// How a caller running generation in the background should react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network-level hiccup; the whole request may be retried
    Transient,
    /// The request can never succeed as issued; drop it without retrying
    Permanent,
    /// Operator or programming error; surface it loudly
    Fatal,
}

/// Errors produced by the generation pipeline
#[derive(Debug, Error)]
pub enum ImageGenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    ReferenceImage(#[from] ReferenceImageError),

    /// No adapter exists for the requested provider name
    #[error("Image generation provider '{0}' is not supported")]
    UnknownProvider(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ImageGenError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::Template(TemplateError::Read { .. }) | Self::ReferenceImage(ReferenceImageError::Io { .. }) => {
                ErrorClass::Fatal
            }
            Self::Template(_) | Self::ReferenceImage(_) | Self::UnknownProvider(_) => ErrorClass::Permanent,
            Self::Provider(e) if e.is_transient() => ErrorClass::Transient,
            Self::Provider(_) => ErrorClass::Permanent,
        }
    }
}

/// Prompt template lookup and rendering errors
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("No prompt template named '{0}'")]
    Missing(String),

    /// The template uses placeholders the caller did not supply
    #[error("Prompt template '{template}' has unresolved placeholders: {}", .names.join(", "))]
    UnresolvedPlaceholders { template: String, names: Vec<String> },

    #[error("Failed to read prompt template '{template}': {source}")]
    Read {
        template: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid prompt template '{template}': {source}")]
    Parse {
        template: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Reference image resolution errors
#[derive(Debug, Error)]
pub enum ReferenceImageError {
    /// A reference resolved to a stored object that is not an image
    #[error("Blob {key} is not an image")]
    NotAnImage { key: String },

    #[error("Failed to read reference image {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a provider adapter
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{} API key is missing", .provider.label())]
    MissingApiKey { provider: ProviderKind },

    #[error("Reference image is missing data")]
    MissingReferenceData,

    #[error("Reference image data is invalid: {0}")]
    InvalidReferenceData(String),

    /// The provider answered with a non-success status
    #[error("{} request failed: {message}", .provider.label())]
    Api {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("{} request timed out: {message}", .provider.label())]
    Timeout { provider: ProviderKind, message: String },

    #[error("{} connection failed: {message}", .provider.label())]
    Connection { provider: ProviderKind, message: String },

    #[error("{} request failed: {message}", .provider.label())]
    Transport { provider: ProviderKind, message: String },

    #[error("{} returned an unreadable response: {message}", .provider.label())]
    InvalidResponse { provider: ProviderKind, message: String },

    #[error("Failed to build {} HTTP client: {message}", .provider.label())]
    Client { provider: ProviderKind, message: String },
}

impl ProviderError {
    /// Whether retrying the same request may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection { .. })
    }

    /// Wrap a `reqwest` transport failure
    ///
    /// The request URL is stripped from the message since it can carry credentials.
    pub(crate) fn from_transport(provider: ProviderKind, error: reqwest::Error) -> Self {
        let (timeout, connect) = (error.is_timeout(), error.is_connect());
        let message = error.without_url().to_string();

        if timeout {
            Self::Timeout { provider, message }
        } else if connect {
            Self::Connection { provider, message }
        } else {
            Self::Transport { provider, message }
        }
    }
}
