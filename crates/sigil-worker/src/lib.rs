//! Background image generation for stored entities
//!
//! Wraps [`sigil_imagegen::Client`] with an entity lifecycle, a retry policy
//! for transient failures, and discovery of local reference images.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod avatar;
mod error;
mod job;
mod references;
mod retry;
mod status;
mod store;

pub use avatar::Avatar;
pub use error::JobError;
pub use job::{ImageGenerationJob, JobOutcome, JobRunner, NO_IMAGES_MESSAGE};
pub use references::discover_reference_paths;
pub use retry::RetryPolicy;
pub use status::Status;
pub use store::{EntityId, EntityRecord, EntityStore, ImagePayload, MemoryStore, StatusUpdate, StoreError};
