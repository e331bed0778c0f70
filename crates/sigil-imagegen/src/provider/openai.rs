use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder,
    multipart::{Form, Part},
};
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

/// Default `OpenAI` images endpoint
const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/images";

const DEFAULT_MIME_TYPE: &str = "image/png";

/// Optional generation parameters shared by both request shapes
#[derive(Debug, Clone, Default, Serialize)]
struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

impl GenerationOptions {
    fn from_config(config: &ProviderConfig) -> Self {
        let present = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

        Self {
            response_format: present(&config.response_format),
            size: present(&config.size),
            quality: present(&config.quality),
            background: present(&config.background),
            style: present(&config.style),
            n: config.n,
            user: present(&config.user),
        }
    }

    /// Add every present option to a multipart form as a text field
    fn apply_to(&self, mut form: Form) -> Form {
        let fields = [
            ("response_format", self.response_format.clone()),
            ("size", self.size.clone()),
            ("quality", self.quality.clone()),
            ("background", self.background.clone()),
            ("style", self.style.clone()),
            ("n", self.n.map(|n| n.to_string())),
            ("user", self.user.clone()),
        ];

        for (name, value) in fields {
            if let Some(value) = value {
                form = form.text(name, value);
            }
        }

        form
    }
}

/// `OpenAI` image generation provider
pub struct OpenAiProvider {
    client: Client,
    retry: HttpRetry,
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    options: GenerationOptions,
}

impl OpenAiProvider {
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
            client: build_http_client(ProviderKind::OpenAi, config)?,
            retry: HttpRetry::from_config(ProviderKind::OpenAi, config)?,
            api_key: config.api_key.clone(),
            endpoint,
            model: config.model.clone(),
            options: GenerationOptions::from_config(config),
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey {
                provider: ProviderKind::OpenAi,
            })
    }

    fn edit_form(&self, prompt: &str, reference_images: &[ReferenceImage]) -> Result<Form, ProviderError> {
        let mut form = self
            .options
            .apply_to(Form::new().text("model", self.model.clone()).text("prompt", prompt.to_owned()));

        for image in reference_images {
            form = form.part("image[]", upload_part(image)?);
        }

        Ok(form)
    }
}

/// Wire format for the `generations` request
#[derive(Serialize)]
struct GenerationsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    options: &'a GenerationOptions,
}

/// Wire format for both endpoints' responses
#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Option<Vec<WireImage>>,
}

#[derive(Deserialize)]
struct WireImage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

impl From<WireImage> for GeneratedImage {
    fn from(image: WireImage) -> Self {
        let inline_data = image.b64_json.filter(|data| !data.is_empty()).map(|data| InlineImage {
            data,
            mime_type: image.mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned()),
        });

        Self {
            uri: image.url,
            inline_data,
        }
    }
}

/// System prompt and user text joined by a blank line, skipping blank parts
fn combine_prompt(prompt: &Prompt) -> String {
    [prompt.system_prompt.as_deref(), Some(prompt.text.as_str())]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn upload_part(image: &ReferenceImage) -> Result<Part, ProviderError> {
    if image.data.trim().is_empty() {
        return Err(ProviderError::MissingReferenceData);
    }

    let bytes = image
        .decode()
        .map_err(|e| ProviderError::InvalidReferenceData(e.to_string()))?;
    let filename = image
        .filename
        .clone()
        .unwrap_or_else(|| default_filename(&image.mime_type));

    Part::bytes(bytes)
        .file_name(filename)
        .mime_str(&image.mime_type)
        .map_err(|e| ProviderError::InvalidReferenceData(format!("invalid mime type {}: {e}", image.mime_type)))
}

fn default_filename(mime_type: &str) -> String {
    let extension = match mime_type {
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        _ => "",
    };
    let id = uuid::Uuid::new_v4().simple().to_string();

    format!("reference-{}{extension}", &id[..8])
}

fn parse_images(payload: &Value) -> Result<Vec<GeneratedImage>, ProviderError> {
    let response: ImagesResponse = serde_json::from_value(payload.clone()).map_err(|e| ProviderError::InvalidResponse {
        provider: ProviderKind::OpenAi,
        message: e.to_string(),
    })?;

    Ok(response
        .data
        .unwrap_or_default()
        .into_iter()
        .map(GeneratedImage::from)
        .collect())
}

#[async_trait]
impl ImageProvider for OpenAiProvider {
    async fn generate(
        &self,
        prompt: &Prompt,
        reference_images: &[ReferenceImage],
    ) -> Result<GenerationResponse, ProviderError> {
        let api_key = self.api_key()?;
        let text = combine_prompt(prompt);

        tracing::info!(
            provider = "openai",
            model = %self.model,
            endpoint = %self.endpoint,
            reference_count = reference_images.len(),
            prompt_characters = text.len(),
            "sending image generation request"
        );

        // Multipart bodies cannot be replayed; each send builds a fresh request
        let build = || -> Result<RequestBuilder, ProviderError> {
            let request = if reference_images.is_empty() {
                let body = GenerationsRequest {
                    model: &self.model,
                    prompt: &text,
                    options: &self.options,
                };
                self.client
                    .post(format!("{}/generations", self.endpoint))
                    .json(&body)
            } else {
                self.client
                    .post(format!("{}/edits", self.endpoint))
                    .multipart(self.edit_form(&text, reference_images)?)
            };

            Ok(request.header("Authorization", format!("Bearer {api_key}")))
        };

        let response = self.retry.send(build).await.inspect_err(|e| {
            tracing::error!(provider = "openai", error = %e, "image generation request failed");
        })?;

        let status = response.status().as_u16();
        let raw = read_payload(ProviderKind::OpenAi, response).await.inspect_err(|e| {
            tracing::error!(provider = "openai", status, error = %e, "OpenAI image generation API error");
        })?;
        let images = parse_images(&raw)?;

        tracing::info!(provider = "openai", status, image_count = images.len(), "image generation response");

        Ok(GenerationResponse { images, raw })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    /// Reference images are not forwarded to `OpenAI`
    fn supports_reference_images(&self) -> bool {
        false
    }
}
