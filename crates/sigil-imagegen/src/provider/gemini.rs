use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sigil_config::ProviderConfig;
use url::Url;

use super::{ImageProvider, ProviderKind, read_payload};
use crate::{
    error::ProviderError,
    http_client::{HttpRetry, build_http_client},
    types::{GeneratedImage, GenerationResponse, InlineImage, Prompt, ReferenceImage},
};

/// Default Gemini models endpoint
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const DEFAULT_MIME_TYPE: &str = "image/png";

/// Google Gemini image generation provider
pub struct GeminiProvider {
    client: Client,
    retry: HttpRetry,
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    generation_config: Option<Value>,
    safety_settings: Option<Vec<Value>>,
}

impl GeminiProvider {
    /// Create a provider from its configuration
    ///
    /// A missing API key is reported when the first request is made.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = config
            .endpoint
            .as_ref()
            .map_or(DEFAULT_ENDPOINT, Url::as_str)
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            client: build_http_client(ProviderKind::Gemini, config)?,
            retry: HttpRetry::from_config(ProviderKind::Gemini, config)?,
            api_key: config.api_key.clone(),
            endpoint,
            model: config.model.clone(),
            generation_config: config.generation_config.clone(),
            safety_settings: config.safety_settings.clone(),
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey {
                provider: ProviderKind::Gemini,
            })
    }
}

/// Wire format for the `generateImages` request
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImagesRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<&'a [Value]>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        data: &'a str,
    },
}

/// Wire format for the `generateImages` response
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImagesResponse {
    #[serde(default)]
    generated_images: Option<Vec<WireImage>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireImage {
    #[serde(default)]
    image_uri: Option<String>,
    #[serde(default)]
    inline_data: Option<WireInlineData>,
}

#[derive(Deserialize)]
struct WireInlineData {
    #[serde(default)]
    data: Option<String>,
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    mime_type: Option<String>,
}

impl From<WireImage> for GeneratedImage {
    fn from(image: WireImage) -> Self {
        let inline_data = image.inline_data.and_then(|inline| {
            inline.data.map(|data| InlineImage {
                data,
                mime_type: inline.mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned()),
            })
        });

        Self {
            uri: image.image_uri,
            inline_data,
        }
    }
}

fn build_body<'a>(
    prompt: &'a Prompt,
    reference_images: &'a [ReferenceImage],
    generation_config: Option<&'a Value>,
    safety_settings: Option<&'a [Value]>,
) -> GenerateImagesRequest<'a> {
    let mut parts = vec![Part::Text(&prompt.text)];
    parts.extend(reference_images.iter().map(|image| Part::InlineData {
        mime_type: &image.mime_type,
        data: &image.data,
    }));

    let system_instruction = prompt
        .system_prompt
        .as_deref()
        .filter(|system| !system.trim().is_empty())
        .map(|system| Content {
            role: "system",
            parts: vec![Part::Text(system)],
        });

    GenerateImagesRequest {
        contents: vec![Content { role: "user", parts }],
        system_instruction,
        generation_config,
        safety_settings,
    }
}

fn parse_images(payload: &Value) -> Result<Vec<GeneratedImage>, ProviderError> {
    let response: GenerateImagesResponse =
        serde_json::from_value(payload.clone()).map_err(|e| ProviderError::InvalidResponse {
            provider: ProviderKind::Gemini,
            message: e.to_string(),
        })?;

    Ok(response
        .generated_images
        .unwrap_or_default()
        .into_iter()
        .map(GeneratedImage::from)
        .collect())
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(
        &self,
        prompt: &Prompt,
        reference_images: &[ReferenceImage],
    ) -> Result<GenerationResponse, ProviderError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}:generateImages", self.endpoint, self.model);
        let body = build_body(
            prompt,
            reference_images,
            self.generation_config.as_ref(),
            self.safety_settings.as_deref(),
        );

        tracing::debug!(
            provider = "gemini",
            model = %self.model,
            reference_count = reference_images.len(),
            "sending image generation request"
        );

        let response = self
            .retry
            .send(|| Ok(self.client.post(&url).query(&[("key", api_key)]).json(&body)))
            .await
            .inspect_err(|e| {
                tracing::error!(provider = "gemini", error = %e, "image generation request failed");
            })?;

        let raw = read_payload(ProviderKind::Gemini, response).await.inspect_err(|e| {
            tracing::error!(provider = "gemini", error = %e, "Gemini image generation API error");
        })?;
        let images = parse_images(&raw)?;

        tracing::debug!(provider = "gemini", images = images.len(), "image generation complete");

        Ok(GenerationResponse { images, raw })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }
}
