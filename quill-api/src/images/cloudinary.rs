use crate::images::{ImageHost, ImageHostError};
use async_trait::async_trait;
use quill_common::model::image::{ImagePayload, ImageUrl};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::fmt::{Debug, Formatter};
use time::OffsetDateTime;
use tracing::{debug, instrument};

pub const DEFAULT_UPLOAD_URL: &str = "https://api.cloudinary.com/v1_1";

#[derive(Clone, Eq, PartialEq)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Debug for CloudinaryCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryCredentials")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[redacted]")
            .finish()
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Signed uploads to the Cloudinary upload API.
#[derive(Clone, Debug)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    upload_endpoint: String,
    credentials: CloudinaryCredentials,
}

impl CloudinaryClient {
    #[must_use]
    pub fn new(credentials: CloudinaryCredentials, base_url: &str) -> Self {
        let upload_endpoint = format!(
            "{}/{}/image/upload",
            base_url.trim_end_matches('/'),
            credentials.cloud_name
        );

        Self {
            http: reqwest::Client::new(),
            upload_endpoint,
            credentials,
        }
    }

    #[must_use]
    pub fn upload_endpoint(&self) -> &str {
        &self.upload_endpoint
    }

    /// SHA-1 over the signed parameters followed by the API secret. `file`
    /// and `api_key` are never part of it.
    fn signature(&self, timestamp: i64) -> String {
        let mut hasher = Sha1::new();
        hasher.update(format!("timestamp={timestamp}"));
        hasher.update(&self.credentials.api_secret);
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    #[instrument(skip(self))]
    async fn upload(&self, image: &ImagePayload) -> Result<ImageUrl, ImageHostError> {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let timestamp_param = timestamp.to_string();
        let signature = self.signature(timestamp);

        let response = self
            .http
            .post(&self.upload_endpoint)
            .form(&[
                ("file", image.as_data_url()),
                ("api_key", self.credentials.api_key.as_str()),
                ("timestamp", timestamp_param.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => status.canonical_reason().unwrap_or("unknown").to_owned(),
            };
            return Err(ImageHostError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response.json().await?;
        debug!(url = %body.secure_url, "Uploaded image");

        Ok(ImageUrl::new(body.secure_url)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::images::{
        ImageHost, ImageHostError,
        cloudinary::{CloudinaryClient, CloudinaryCredentials},
    };
    use quill_common::model::image::ImagePayload;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    const PIXEL: &str = "data:image/gif;base64,R0lGODlhAQABAAAAACw=";

    fn credentials() -> CloudinaryCredentials {
        CloudinaryCredentials {
            cloud_name: "demo".into(),
            api_key: "1234".into(),
            api_secret: "abcd".into(),
        }
    }

    #[test]
    fn endpoint_and_signature() {
        let client = CloudinaryClient::new(credentials(), "https://api.cloudinary.com/v1_1/");

        assert_eq!(
            client.upload_endpoint(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
        assert_eq!(
            client.signature(1_315_060_510),
            "a21ad0f63beb4de2e5575204b79ab90bffb02c10"
        );
    }

    #[test]
    fn secret_is_not_printed() {
        let client = CloudinaryClient::new(credentials(), "http://localhost");

        assert!(!format!("{client:?}").contains("abcd"));
    }

    #[tokio::test]
    async fn successful_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .and(body_string_contains("api_key=1234"))
            .and(body_string_contains("signature="))
            .and(body_string_contains("file=data%3Aimage%2Fgif"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_id": "cat",
                "secure_url": "https://res.cloudinary.com/demo/image/upload/v1/cat.gif",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CloudinaryClient::new(credentials(), &server.uri());
        let image = ImagePayload::parse(PIXEL.into()).unwrap();

        let url = client.upload(&image).await.unwrap();

        assert_eq!(
            url.get(),
            "https://res.cloudinary.com/demo/image/upload/v1/cat.gif"
        );
    }

    #[tokio::test]
    async fn rejected_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Invalid Signature" },
            })))
            .mount(&server)
            .await;

        let client = CloudinaryClient::new(credentials(), &server.uri());
        let image = ImagePayload::parse(PIXEL.into()).unwrap();

        let err = client.upload(&image).await.unwrap_err();

        assert!(matches!(
            err,
            ImageHostError::Rejected { status: 401, ref message } if message == "Invalid Signature"
        ));
    }

    #[tokio::test]
    async fn unreachable_host() {
        let client = CloudinaryClient::new(credentials(), "http://127.0.0.1:9");
        let image = ImagePayload::parse(PIXEL.into()).unwrap();

        assert!(matches!(
            client.upload(&image).await,
            Err(ImageHostError::Request(_))
        ));
    }
}
