pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::ProviderError,
    types::{GenerationResponse, Prompt, ReferenceImage},
};

/// Image generation backends this crate can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
}

impl ProviderKind {
    /// Human-readable vendor name used in error messages
    pub const fn label(self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenAi => "OpenAI",
        }
    }
}

/// Trait for image generation backends
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generate images for a rendered prompt
    async fn generate(
        &self,
        prompt: &Prompt,
        reference_images: &[ReferenceImage],
    ) -> Result<GenerationResponse, ProviderError>;

    /// Which backend this adapter talks to
    fn kind(&self) -> ProviderKind;

    /// Whether reference images are forwarded to the backend
    fn supports_reference_images(&self) -> bool {
        true
    }

    /// Get the provider name
    fn name(&self) -> &str {
        self.kind().into()
    }
}

/// Read a provider response into JSON, mapping non-success statuses to errors
///
/// An empty body is treated as an empty object.
pub(crate) async fn read_payload(provider: ProviderKind, response: reqwest::Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::from_transport(provider, e))?;

    let payload = if body.trim().is_empty() {
        Ok(Value::Object(serde_json::Map::new()))
    } else {
        serde_json::from_str::<Value>(&body)
    };

    if !status.is_success() {
        let message = payload
            .ok()
            .as_ref()
            .and_then(|value| value.pointer("/error/message"))
            .and_then(Value::as_str)
            .map_or_else(|| format!("HTTP {}", status.as_u16()), ToOwned::to_owned);

        return Err(ProviderError::Api {
            provider,
            status: status.as_u16(),
            message,
        });
    }

    payload.map_err(|e| ProviderError::InvalidResponse {
        provider,
        message: e.to_string(),
    })
}
