//! Error taxonomy shared by every engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Segment not found: {0}")]
    SegmentNotFound(String),

    #[error("Composite not found: {0}")]
    CompositeNotFound(String),

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProcessError {
    /// True for the unknown-id family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SegmentNotFound(_) | Self::CompositeNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ProcessError>;
