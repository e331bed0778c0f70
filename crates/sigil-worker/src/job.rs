use std::{path::PathBuf, sync::Arc};

use sigil_config::JobConfig;
use sigil_imagegen::{Client, ErrorClass, GenerationRequest, ImageGenError};

use crate::{
    error::JobError,
    references::discover_reference_paths,
    retry::RetryPolicy,
    store::{EntityId, EntityStore, ImagePayload, StatusUpdate},
};

/// Message recorded when a provider answers without a usable image
pub const NO_IMAGES_MESSAGE: &str = "No images returned from API";

const DEFAULT_TEMPLATE: &str = "avatar";
const DEFAULT_REFERENCE_LIMIT: usize = 3;

/// How a single attempt ended, when it did not return an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The entity now holds the generated image
    Completed(ImagePayload),
    /// The provider returned no usable image; the entity was marked failed
    Failed(String),
    /// A permanent error; the entity was marked failed and the request dropped
    Discarded(String),
}

/// Generates the image for one stored entity
pub struct ImageGenerationJob {
    client: Client,
    store: Arc<dyn EntityStore>,
    template: String,
    reference_keys: Vec<String>,
    reference_paths: Vec<PathBuf>,
    provider: Option<String>,
    reference_directory: Option<PathBuf>,
    reference_limit: usize,
}

impl ImageGenerationJob {
    pub fn new(client: Client, store: Arc<dyn EntityStore>) -> Self {
        Self {
            client,
            store,
            template: DEFAULT_TEMPLATE.to_owned(),
            reference_keys: Vec::new(),
            reference_paths: Vec::new(),
            provider: None,
            reference_directory: None,
            reference_limit: DEFAULT_REFERENCE_LIMIT,
        }
    }

    /// Job using the template and reference settings from `[job]`
    pub fn from_config(client: Client, store: Arc<dyn EntityStore>, config: &JobConfig) -> Self {
        Self {
            template: config.template.clone(),
            reference_directory: config.reference_directory.clone(),
            reference_limit: config.reference_limit,
            ..Self::new(client, store)
        }
    }

    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Opaque storage keys attached to every request
    #[must_use]
    pub fn with_reference_keys(mut self, keys: Vec<String>) -> Self {
        self.reference_keys = keys;
        self
    }

    /// Local files attached to every request, ahead of discovered ones
    #[must_use]
    pub fn with_reference_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.reference_paths = paths;
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.provider = provider;
        self
    }

    /// Directory scanned for local reference images on each attempt
    #[must_use]
    pub fn with_reference_directory(mut self, directory: Option<PathBuf>, limit: usize) -> Self {
        self.reference_directory = directory;
        self.reference_limit = limit;
        self
    }

    /// Run one generation attempt for `entity_id`
    ///
    /// Transient errors leave the entity in `Processing` and are returned as
    /// [`JobError::Transient`]. Permanent errors mark it failed and yield
    /// [`JobOutcome::Discarded`]. Fatal errors, including store failures once
    /// the entity is `Processing`, mark it failed and are returned.
    pub async fn perform(&self, entity_id: EntityId) -> Result<JobOutcome, JobError> {
        self.store.transition(entity_id, StatusUpdate::Processing).await?;

        match self.generate(entity_id).await {
            Err(JobError::Store(error)) => {
                tracing::error!(entity_id, error = %error, "entity store failed during image generation");
                self.mark_failed(entity_id, error.to_string()).await;
                Err(JobError::Store(error))
            }
            result => result,
        }
    }

    async fn generate(&self, entity_id: EntityId) -> Result<JobOutcome, JobError> {
        let attributes = self.store.attributes(entity_id).await?;

        let mut reference_paths = self.reference_paths.clone();
        if let Some(dir) = self.reference_directory.as_deref() {
            reference_paths.extend(discover_reference_paths(dir, self.reference_limit));
        }

        let request = GenerationRequest::new(self.template.clone(), attributes)
            .with_reference_refs(self.reference_keys.clone())
            .with_reference_paths(reference_paths)
            .with_provider(self.provider.clone());

        let response = match self.client.generate(&request).await {
            Ok(response) => response,
            Err(e) => return self.handle_error(entity_id, e).await,
        };

        let Some(payload) = response.first_usable().and_then(ImagePayload::from_image) else {
            tracing::warn!(entity_id, "provider returned no usable image");
            self.store
                .transition(entity_id, StatusUpdate::Failed(NO_IMAGES_MESSAGE.to_owned()))
                .await?;
            return Ok(JobOutcome::Failed(NO_IMAGES_MESSAGE.to_owned()));
        };

        self.store
            .transition(entity_id, StatusUpdate::Completed(payload.clone()))
            .await?;

        tracing::info!(entity_id, images = response.images.len(), "image generation completed");

        Ok(JobOutcome::Completed(payload))
    }

    async fn handle_error(&self, entity_id: EntityId, error: ImageGenError) -> Result<JobOutcome, JobError> {
        match error.class() {
            ErrorClass::Transient => {
                tracing::warn!(entity_id, error = %error, "image generation network error");
                Err(JobError::Transient(error))
            }
            ErrorClass::Permanent => {
                tracing::error!(entity_id, error = %error, "image generation failed, discarding");
                let message = error.to_string();
                self.mark_failed(entity_id, message.clone()).await;
                Ok(JobOutcome::Discarded(message))
            }
            ErrorClass::Fatal => {
                tracing::error!(entity_id, error = %error, "image generation failed");
                self.mark_failed(entity_id, error.to_string()).await;
                Err(JobError::Fatal(error))
            }
        }
    }

    /// Record a failure; the original error matters more than a store failure here
    async fn mark_failed(&self, entity_id: EntityId, message: String) {
        if let Err(e) = self.store.transition(entity_id, StatusUpdate::Failed(message)).await {
            tracing::error!(entity_id, error = %e, "failed to record generation failure");
        }
    }
}

/// Runs a job with retries for transient failures
#[derive(Debug, Clone, Copy, Default)]
pub struct JobRunner {
    policy: RetryPolicy,
}

impl JobRunner {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Perform `job` for `entity_id`, retrying transient failures with backoff
    ///
    /// When the last attempt also fails transiently the entity is marked
    /// failed with that error and [`JobError::RetriesExhausted`] is returned.
    pub async fn run(&self, job: &ImageGenerationJob, entity_id: EntityId) -> Result<JobOutcome, JobError> {
        let mut attempt = 1;

        loop {
            let error = match job.perform(entity_id).await {
                Err(JobError::Transient(error)) => error,
                result => return result,
            };

            if attempt >= self.policy.max_attempts {
                tracing::error!(entity_id, attempt, error = %error, "image generation retries exhausted");
                job.mark_failed(entity_id, error.to_string()).await;
                return Err(JobError::RetriesExhausted {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                entity_id,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "retrying image generation"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
