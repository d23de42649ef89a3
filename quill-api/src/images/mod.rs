//! Hosting for post images.

pub mod cloudinary;

use async_trait::async_trait;
use quill_common::model::image::{ImagePayload, ImageUrl, InvalidImageUrlError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("No image host is configured")]
    Unconfigured,
    #[error("Image upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Image host rejected the upload with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Image host returned an unusable URL: {0}")]
    InvalidUrl(#[from] InvalidImageUrlError),
}

/// Turns an inline image into a durable URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: &ImagePayload) -> Result<ImageUrl, ImageHostError>;
}

/// Used when no credentials are configured: every upload fails.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct DisabledImageHost;

#[async_trait]
impl ImageHost for DisabledImageHost {
    async fn upload(&self, _image: &ImagePayload) -> Result<ImageUrl, ImageHostError> {
        Err(ImageHostError::Unconfigured)
    }
}
