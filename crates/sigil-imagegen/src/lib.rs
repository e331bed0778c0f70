//! Provider-abstracted image generation
//!
//! Renders a prompt template, normalizes reference images, and dispatches
//! the request to one of several interchangeable image generation backends.

#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod client;
mod error;
mod http_client;
mod prompt;
pub mod provider;
mod reference;
mod registry;
mod types;

pub use client::{Client, ClientBuilder};
pub use error::{ErrorClass, ImageGenError, ProviderError, ReferenceImageError, Result, TemplateError};
pub use prompt::{PromptLoader, TemplateDefinition, TemplateDirectory, TemplateSource};
pub use provider::{ImageProvider, ProviderKind};
pub use reference::{Blob, BlobResolver, DirectoryBlobStore, ReferenceImageBuilder, mime_type_for};
pub use registry::ProviderRegistry;
pub use types::{
    Attributes, ExampleImage, GeneratedImage, GenerationRequest, GenerationResponse, InlineImage, Prompt,
    ReferenceImage, ReferenceOrigin,
};
