use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Debug, Formatter};
use thiserror::Error;

/// Upper bound on the decoded size of an inline image.
pub const IMAGE_PAYLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;

/// A durable, publicly reachable image URL as stored on a post.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct ImageUrl(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The image URL is invalid: {0}")]
pub struct InvalidImageUrlError(String);

impl ImageUrl {
    pub fn new(url: String) -> Result<Self, InvalidImageUrlError> {
        if url.starts_with("https://") || url.starts_with("http://") {
            Ok(Self(url))
        } else {
            Err(InvalidImageUrlError(url))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for ImageUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        ImageUrl::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"ImageUrl"))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum InvalidImagePayloadError {
    #[error("The image must be sent as a base64 data URL")]
    NotADataUrl,
    #[error("Unsupported image type: {0}")]
    UnsupportedMediaType(String),
    #[error("The image data is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("The image is empty")]
    Empty,
    #[error("The image is larger than {IMAGE_PAYLOAD_MAX_BYTES} bytes")]
    TooLarge,
}

/// An inline image as sent by clients: `data:image/<kind>;base64,<data>`.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct ImagePayload {
    data_url: String,
    media_type: String,
}

impl ImagePayload {
    pub fn parse(data_url: String) -> Result<Self, InvalidImagePayloadError> {
        let (header, data) = data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or(InvalidImagePayloadError::NotADataUrl)?;

        let media_type = header
            .strip_suffix(";base64")
            .ok_or(InvalidImagePayloadError::NotADataUrl)?;
        if !media_type.starts_with("image/") || media_type.len() == "image/".len() {
            return Err(InvalidImagePayloadError::UnsupportedMediaType(
                media_type.to_owned(),
            ));
        }

        // base64 inflates by 4/3; refuse before decoding anything huge.
        if data.len() / 4 * 3 > IMAGE_PAYLOAD_MAX_BYTES + 3 {
            return Err(InvalidImagePayloadError::TooLarge);
        }
        let decoded = BASE64_STANDARD.decode(data)?;
        if decoded.is_empty() {
            return Err(InvalidImagePayloadError::Empty);
        }
        if decoded.len() > IMAGE_PAYLOAD_MAX_BYTES {
            return Err(InvalidImagePayloadError::TooLarge);
        }

        let media_type = media_type.to_owned();
        Ok(Self {
            data_url,
            media_type,
        })
    }

    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    #[must_use]
    pub fn as_data_url(&self) -> &str {
        &self.data_url
    }
}

impl Debug for ImagePayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("media_type", &self.media_type)
            .field("len", &self.data_url.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::image::{ImagePayload, ImageUrl, InvalidImagePayloadError};

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn accepts_base64_images() {
        let payload = ImagePayload::parse(PIXEL.into()).unwrap();

        assert_eq!(payload.media_type(), "image/png");
        assert_eq!(payload.as_data_url(), PIXEL);
    }

    #[test]
    fn rejects_other_payloads() {
        assert_eq!(
            ImagePayload::parse("https://example.com/cat.png".into()),
            Err(InvalidImagePayloadError::NotADataUrl)
        );
        assert_eq!(
            ImagePayload::parse("data:image/png,rawbytes".into()),
            Err(InvalidImagePayloadError::NotADataUrl)
        );
        assert_eq!(
            ImagePayload::parse("data:text/plain;base64,aGVsbG8=".into()),
            Err(InvalidImagePayloadError::UnsupportedMediaType(
                "text/plain".into()
            ))
        );
        assert_eq!(
            ImagePayload::parse("data:image/png;base64,".into()),
            Err(InvalidImagePayloadError::Empty)
        );
        assert!(matches!(
            ImagePayload::parse("data:image/png;base64,!!!".into()),
            Err(InvalidImagePayloadError::Decode(_))
        ));
    }

    #[test]
    fn image_urls_must_be_http() {
        assert!(ImageUrl::new("https://res.cloudinary.com/demo/cat.png".into()).is_ok());
        assert!(ImageUrl::new("ftp://example.com/cat.png".into()).is_err());
    }
}
