use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sigil_imagegen::{Attributes, GeneratedImage};
use thiserror::Error;

use crate::status::Status;

pub type EntityId = u64;

/// Image stored on a completed entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImagePayload {
    /// Base64 image bytes
    Inline { data: String, mime_type: String },
    /// Location of an image hosted by the provider
    Remote { uri: String },
}

impl ImagePayload {
    /// Payload for a generated image, preferring inline bytes over a remote location
    pub fn from_image(image: &GeneratedImage) -> Option<Self> {
        if let Some(inline) = &image.inline_data {
            return Some(Self::Inline {
                data: inline.data.clone(),
                mime_type: inline.mime_type.clone(),
            });
        }

        image.uri.clone().map(|uri| Self::Remote { uri })
    }
}

/// Change applied to an entity by the job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Processing,
    Completed(ImagePayload),
    /// Failure with a human-readable message
    Failed(String),
}

impl StatusUpdate {
    pub const fn status(&self) -> Status {
        match self {
            Self::Processing => Status::Processing,
            Self::Completed(_) => Status::Completed,
            Self::Failed(_) => Status::Failed,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("entity {0} not found")]
    NotFound(EntityId),

    #[error("entity {id} cannot move from {from} to {to}")]
    InvalidTransition { id: EntityId, from: Status, to: Status },
}

/// Persistence for the entities images are generated for
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Attributes handed to the prompt template
    async fn attributes(&self, id: EntityId) -> Result<Attributes, StoreError>;

    /// Apply a status change, rejecting transitions the lifecycle forbids
    async fn transition(&self, id: EntityId, update: StatusUpdate) -> Result<(), StoreError>;
}

/// Stored state of one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRecord {
    pub attributes: Attributes,
    pub status: Status,
    pub image: Option<ImagePayload>,
    pub error_message: Option<String>,
}

/// In-process [`EntityStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: DashMap<EntityId, EntityRecord>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new pending entity and return its id
    pub fn insert(&self, attributes: Attributes) -> EntityId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entities.insert(
            id,
            EntityRecord {
                attributes,
                ..EntityRecord::default()
            },
        );
        id
    }

    /// Snapshot of an entity
    pub fn get(&self, id: EntityId) -> Option<EntityRecord> {
        self.entities.get(&id).map(|record| record.value().clone())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn attributes(&self, id: EntityId) -> Result<Attributes, StoreError> {
        self.entities
            .get(&id)
            .map(|record| record.attributes.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn transition(&self, id: EntityId, update: StatusUpdate) -> Result<(), StoreError> {
        let mut record = self.entities.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        let next = update.status();
        if !record.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                id,
                from: record.status,
                to: next,
            });
        }

        record.status = next;
        match update {
            StatusUpdate::Processing => {}
            StatusUpdate::Completed(payload) => {
                record.image = Some(payload);
                record.error_message = None;
            }
            StatusUpdate::Failed(message) => record.error_message = Some(message),
        }

        Ok(())
    }
}
