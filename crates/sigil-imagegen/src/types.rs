use std::path::PathBuf;

use base64::Engine;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Values substituted into a prompt template, keyed by placeholder name
pub type Attributes = IndexMap<String, serde_json::Value>;

/// Example image a template advertises to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExampleImage {
    pub label: String,
    pub url: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Rendered prompt handed to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// System instruction declared by the template
    pub system_prompt: Option<String>,
    /// Rendered user prompt, including the example image listing
    pub text: String,
    /// Example images declared by the template, in declaration order
    pub example_images: Vec<ExampleImage>,
}

/// Where a reference image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceOrigin {
    /// Resolved from an opaque storage key
    ExternalStorage,
    /// Read from a local file path
    LocalFilesystem,
}

/// Reference image normalized for transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    /// Standard base64 encoding of the image bytes
    pub data: String,
    pub mime_type: String,
    pub filename: Option<String>,
    pub origin: ReferenceOrigin,
}

impl ReferenceImage {
    /// Encode raw bytes into a reference image
    pub fn encode(bytes: &[u8], mime_type: impl Into<String>, filename: Option<String>, origin: ReferenceOrigin) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
            filename,
            origin,
        }
    }

    /// Decode the payload back to raw bytes
    pub fn decode(&self) -> std::result::Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.data.trim())
    }
}

/// Image bytes returned inline by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    /// Base64-encoded image bytes
    pub data: String,
    pub mime_type: String,
}

/// One generated image: a remote location, inline bytes, or both
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineImage>,
}

impl GeneratedImage {
    /// An image is usable when it carries inline data or a remote location
    pub const fn is_usable(&self) -> bool {
        self.uri.is_some() || self.inline_data.is_some()
    }
}

/// Normalized provider response
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub images: Vec<GeneratedImage>,
    /// Unmodified provider payload, kept for diagnostics
    pub raw: serde_json::Value,
}

impl GenerationResponse {
    /// First image that carries inline data or a remote location
    pub fn first_usable(&self) -> Option<&GeneratedImage> {
        self.images.iter().find(|image| image.is_usable())
    }
}

/// Parameters of a single generation call
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Prompt template identifier
    pub template_id: String,
    /// Values for the template placeholders
    pub attributes: Attributes,
    /// Opaque storage keys resolved through the configured blob resolver
    pub reference_image_refs: Vec<String>,
    /// Local files attached as reference images
    pub reference_image_paths: Vec<PathBuf>,
    /// Provider override; the configured default is used when absent
    pub provider: Option<String>,
}

impl GenerationRequest {
    pub fn new(template_id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            template_id: template_id.into(),
            attributes,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reference_refs(mut self, refs: Vec<String>) -> Self {
        self.reference_image_refs = refs;
        self
    }

    #[must_use]
    pub fn with_reference_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.reference_image_paths = paths;
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.provider = provider;
        self
    }
}
