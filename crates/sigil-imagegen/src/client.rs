use std::sync::Arc;

use sigil_config::ImageGenConfig;

use crate::{
    error::Result,
    prompt::PromptLoader,
    reference::{BlobResolver, ReferenceImageBuilder},
    registry::ProviderRegistry,
    types::{GenerationRequest, GenerationResponse},
};

/// Entry point for generating an image from a template and attributes
#[derive(Clone)]
pub struct Client {
    prompts: PromptLoader,
    references: ReferenceImageBuilder,
    registry: Arc<ProviderRegistry>,
}

impl Client {
    pub fn builder(config: Arc<ImageGenConfig>, prompts: PromptLoader) -> ClientBuilder {
        ClientBuilder::new(config, prompts)
    }

    /// Render the prompt, gather references, and dispatch to a provider
    ///
    /// Reference images are dropped when the selected provider does not
    /// accept them. Errors are returned as-is; retrying is up to the caller.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let prompt = self.prompts.load(&request.template_id, &request.attributes)?;

        let mut reference_images = self.references.build(&request.reference_image_refs)?;
        reference_images.extend(self.references.build_from_paths(&request.reference_image_paths)?);

        let provider = match request.provider.as_deref() {
            Some(name) => self.registry.resolve(name)?,
            None => self.registry.resolve_default()?,
        };

        if !reference_images.is_empty() && !provider.supports_reference_images() {
            tracing::warn!(
                provider = provider.name(),
                reference_count = reference_images.len(),
                "provider does not accept reference images, dropping them"
            );
            reference_images.clear();
        }

        tracing::debug!(
            provider = provider.name(),
            template = %request.template_id,
            reference_count = reference_images.len(),
            "dispatching image generation request"
        );

        let response = provider.generate(&prompt, &reference_images).await?;

        Ok(response)
    }
}

/// Builder for constructing a [`Client`]
pub struct ClientBuilder {
    config: Arc<ImageGenConfig>,
    prompts: PromptLoader,
    resolver: Option<Arc<dyn BlobResolver>>,
    registry: Option<Arc<ProviderRegistry>>,
}

impl ClientBuilder {
    pub fn new(config: Arc<ImageGenConfig>, prompts: PromptLoader) -> Self {
        Self {
            config,
            prompts,
            resolver: None,
            registry: None,
        }
    }

    /// Resolver for opaque reference image keys
    #[must_use]
    pub fn blob_resolver(mut self, resolver: Arc<dyn BlobResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use an existing registry instead of building one from the configuration
    #[must_use]
    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Client {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ProviderRegistry::new(self.config)));

        Client {
            prompts: self.prompts,
            references: ReferenceImageBuilder::new(self.resolver),
            registry,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;
    use indexmap::IndexMap;
    use serde_json::json;

    use super::*;
    use crate::{
        error::{ImageGenError, ProviderError},
        prompt::TemplateDefinition,
        provider::{ImageProvider, ProviderKind},
        reference::Blob,
        types::{Attributes, GeneratedImage, Prompt, ReferenceImage},
    };

    /// Records what it was called with
    struct Recording {
        accepts_references: bool,
        calls: AtomicUsize,
        seen_references: Mutex<Vec<usize>>,
    }

    impl Recording {
        fn new(accepts_references: bool) -> Arc<Self> {
            Arc::new(Self {
                accepts_references,
                calls: AtomicUsize::new(0),
                seen_references: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ImageProvider for Recording {
        async fn generate(
            &self,
            _prompt: &Prompt,
            reference_images: &[ReferenceImage],
        ) -> std::result::Result<GenerationResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_references.lock().unwrap().push(reference_images.len());
            Ok(GenerationResponse {
                images: vec![GeneratedImage {
                    uri: Some("https://cdn.example/out.png".to_owned()),
                    inline_data: None,
                }],
                raw: json!({}),
            })
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        fn supports_reference_images(&self) -> bool {
            self.accepts_references
        }
    }

    fn client(provider: Arc<Recording>) -> Client {
        let mut templates = IndexMap::new();
        templates.insert(
            "avatar".to_owned(),
            TemplateDefinition {
                system_prompt: None,
                user_prompt_template: "Portrait of {{ name }}".to_owned(),
                example_images: Vec::new(),
            },
        );

        let mut blobs = HashMap::new();
        blobs.insert(
            "ref-1".to_owned(),
            Blob {
                key: "ref-1".to_owned(),
                bytes: b"img".to_vec(),
                content_type: "image/png".to_owned(),
                filename: None,
            },
        );

        let config = Arc::new(ImageGenConfig {
            provider: Some("stub".to_owned()),
            providers: IndexMap::new(),
        });
        let registry = Arc::new(ProviderRegistry::with_providers(
            Arc::clone(&config),
            [("stub", provider as Arc<dyn ImageProvider>)],
        ));

        Client::builder(config, PromptLoader::new(Arc::new(templates)))
            .blob_resolver(Arc::new(blobs))
            .registry(registry)
            .build()
    }

    fn request() -> GenerationRequest {
        let attributes: Attributes = [("name".to_owned(), json!("Astra"))].into_iter().collect();
        GenerationRequest::new("avatar", attributes).with_reference_refs(vec!["ref-1".to_owned()])
    }

    #[tokio::test]
    async fn drops_references_for_providers_without_support() {
        let provider = Recording::new(false);
        let client = client(Arc::clone(&provider));

        let response = client.generate(&request()).await.unwrap();

        assert_eq!(response.images.len(), 1);
        assert_eq!(*provider.seen_references.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn forwards_references_when_supported() {
        let provider = Recording::new(true);
        let client = client(Arc::clone(&provider));

        client.generate(&request()).await.unwrap();

        assert_eq!(*provider.seen_references.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn errors_stop_before_the_provider() {
        let provider = Recording::new(true);
        let client = client(Arc::clone(&provider));

        let missing_template = GenerationRequest::new("badge", Attributes::new());
        assert!(matches!(
            client.generate(&missing_template).await,
            Err(ImageGenError::Template(_))
        ));

        let unknown = request().with_provider(Some("dalle".to_owned()));
        assert!(matches!(
            client.generate(&unknown).await,
            Err(ImageGenError::UnknownProvider(_))
        ));

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
