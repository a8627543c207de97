//! Object storage for profile pictures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::AvatarError;

/// Bucket every avatar is written to.
pub const AVATAR_BUCKET: &str = "avatars";

/// Content type for a lowercase file extension, if it is an accepted image.
#[must_use]
pub fn content_type_for(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Uploads an object and returns the URL it can be read from.
#[async_trait]
pub trait AvatarStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `AvatarError` if the upload is rejected or the store is unreachable.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Url, AvatarError>;
}

#[derive(Clone, Debug)]
pub struct AvatarConfig {
    pub base_url: String,
    pub api_key: String,
    pub bucket: String,
}

impl AvatarConfig {
    /// Config for the default bucket. `None` when either value is blank,
    /// which leaves uploads disabled.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Option<Self> {
        let base_url = base_url.into().trim().to_owned();
        let api_key = api_key.into().trim().to_owned();
        if base_url.is_empty() || api_key.is_empty() {
            return None;
        }
        Some(Self {
            base_url,
            api_key,
            bucket: AVATAR_BUCKET.to_owned(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.bucket,
            path
        )
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.bucket,
            path
        )
    }
}

/// Storage-bucket HTTP API client.
#[derive(Clone)]
pub struct HttpAvatarStore {
    client: Client,
    config: AvatarConfig,
}

impl HttpAvatarStore {
    #[must_use]
    pub fn new(config: AvatarConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl AvatarStore for HttpAvatarStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Url, AvatarError> {
        let response = self
            .client
            .put(self.config.object_url(path))
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AvatarError::HttpStatus(response.status()));
        }

        let public = self.config.public_url(path);
        Url::parse(&public).map_err(|_| AvatarError::InvalidUrl(public))
    }
}

/// Keeps uploads in memory. Used by tests and offline runs.
#[derive(Clone, Default)]
pub struct InMemoryAvatarStore {
    objects: Arc<Mutex<HashMap<String, (String, Vec<u8>)>>>,
}

impl InMemoryAvatarStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored content type and size for `path`.
    #[must_use]
    pub fn object(&self, path: &str) -> Option<(String, usize)> {
        let objects = self.objects.lock().ok()?;
        objects
            .get(path)
            .map(|(content_type, bytes)| (content_type.clone(), bytes.len()))
    }
}

#[async_trait]
impl AvatarStore for InMemoryAvatarStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Url, AvatarError> {
        let raw = format!("memory://{AVATAR_BUCKET}/{path}");
        let url = Url::parse(&raw).map_err(|_| AvatarError::InvalidUrl(raw))?;
        let mut objects = self
            .objects
            .lock()
            .map_err(|e| AvatarError::Unavailable(e.to_string()))?;
        objects.insert(path.to_owned(), (content_type.to_owned(), bytes));
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_bucket_layout() {
        let config = AvatarConfig::new("https://files.example.org/", "k").unwrap();
        assert_eq!(
            config.object_url("u/1.png"),
            "https://files.example.org/storage/v1/object/avatars/u/1.png"
        );
        assert_eq!(
            config.public_url("u/1.png"),
            "https://files.example.org/storage/v1/object/public/avatars/u/1.png"
        );
    }

    #[test]
    fn blank_config_disables_uploads() {
        assert!(AvatarConfig::new("", "k").is_none());
        assert!(AvatarConfig::new("https://files.example.org", "  ").is_none());
    }

    #[test]
    fn only_images_are_accepted() {
        assert_eq!(content_type_for("PNG"), Some("image/png"));
        assert_eq!(content_type_for("jpeg"), Some("image/jpeg"));
        assert_eq!(content_type_for("exe"), None);
    }
}
