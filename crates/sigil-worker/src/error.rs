use sigil_imagegen::ImageGenError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by a generation job
#[derive(Debug, Error)]
pub enum JobError {
    /// Network failure; the attempt may be repeated
    #[error("transient generation failure: {0}")]
    Transient(#[source] ImageGenError),

    /// Configuration or programming error; the entity was marked failed
    #[error(transparent)]
    Fatal(ImageGenError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every attempt failed transiently; the entity was marked failed
    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ImageGenError,
    },
}

impl JobError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
