use crate::infrastructure::error::JournalError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

pub const ENTRY_IMAGES_BUCKET: &str = "prayer-images";
pub const AVATARS_BUCKET: &str = "avatars";

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_object_name(extension: &str) -> String {
    let sequence = NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed);
    let extension = extension.trim_start_matches('.');
    format!("{}-{sequence}.{extension}", Utc::now().timestamp_micros())
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads the bytes and returns a publicly resolvable URL.
    async fn upload(
        &self,
        access_token: &str,
        bucket: &str,
        object_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, JournalError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestObjectStorage {
    client: Client,
    base_url: Url,
    anon_key: String,
}

impl ReqwestObjectStorage {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self, JournalError> {
        let base_url = Url::parse(base_url)
            .map_err(|error| JournalError::InvalidConfig(format!("invalid api base url: {error}")))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            anon_key: anon_key.into(),
        })
    }

    fn object_endpoint(&self, segments: &[&str]) -> Result<Url, JournalError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| JournalError::Storage("api base URL cannot be a base".to_string()))?;
            path.push("storage");
            path.push("v1");
            path.push("object");
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    pub fn public_url(&self, bucket: &str, object_name: &str) -> Result<String, JournalError> {
        Ok(self
            .object_endpoint(&["public", bucket, object_name])?
            .to_string())
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), JournalError> {
        if value.trim().is_empty() {
            return Err(JournalError::Storage(format!("{field} must not be empty")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for ReqwestObjectStorage {
    async fn upload(
        &self,
        access_token: &str,
        bucket: &str,
        object_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, JournalError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(bucket, "bucket")?;
        Self::ensure_non_empty(object_name, "object name")?;
        if bytes.is_empty() {
            return Err(JournalError::Storage("upload body must not be empty".to_string()));
        }

        let url = self.object_endpoint(&[bucket, object_name])?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|error| JournalError::Storage(format!("upload request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JournalError::Storage(format!(
                "upload failed: http {}; body={body}",
                status.as_u16()
            )));
        }

        self.public_url(bucket, object_name)
    }
}
