//! # Avatar object storage
//!
//! Avatar images live in a managed object-storage bucket; the database only keeps the
//! object key. [`AvatarStorage`] is the seam the handlers use:
//!
//! - [`SupabaseStorage`] talks to a Supabase-compatible storage REST API with the
//!   service key, using `reqwest`.
//! - [`MemoryAvatarStorage`] keeps objects in a map, for tests and local runs.
//!
//! Keys are generated by [`avatar_key`] as `{uuid}.{ext}`. They are bare object
//! names: a key that carries the bucket path anywhere (`images/abc.png`,
//! `public/images/abc.png`) is rejected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::settings::StorageSettings;

/// Image formats accepted for avatars.
pub const ALLOWED_AVATAR_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object not found: {0}")]
    Missing(String),

    #[error("storage rejected request ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait AvatarStorage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// A URL granting read access to `key` for `ttl`.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;
}

/// Whether `content_type` is an accepted avatar format.
pub fn is_allowed_avatar_type(content_type: &str) -> bool {
    ALLOWED_AVATAR_TYPES.contains(&content_type)
}

/// A fresh object key, keeping the extension of the uploaded file name.
pub fn avatar_key(file_name: Option<&str>) -> String {
    let ext = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string());
    format!("{}.{}", Uuid::new_v4(), ext)
}

fn check_key(key: &str, bucket: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.contains(&format!("{bucket}/")) || key.contains("..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Storage client for a Supabase storage bucket.
#[derive(Clone, Debug)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(settings: &StorageSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.url.trim_end_matches('/').to_string(),
            service_key: settings.service_key.clone(),
            bucket: settings.bucket.clone(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Rejected { status, body })
    }
}

#[async_trait]
impl AvatarStorage for SupabaseStorage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        check_key(key, &self.bucket)?;
        let url = self.object_url(&format!("{}/{}", self.bucket, key));
        let response = self
            .authorized(self.client.post(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;
        Self::check(response).await?;
        tracing::debug!("Uploaded avatar {}", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        check_key(key, &self.bucket)?;
        let url = self.object_url(&self.bucket);
        let response = self
            .authorized(self.client.delete(url))
            .json(&serde_json::json!({ "prefixes": [key] }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        check_key(key, &self.bucket)?;
        let url = self.object_url(&format!("sign/{}/{}", self.bucket, key));
        let response = self
            .authorized(self.client.post(url))
            .json(&serde_json::json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .await?;
        let signed: SignedUrlResponse = Self::check(response).await?.json().await?;
        // the API answers with a path relative to /storage/v1
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }
}

/// In-memory AvatarStorage for testing.
#[derive(Clone, Debug, Default)]
pub struct MemoryAvatarStorage {
    bucket: String,
    objects: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
}

impl MemoryAvatarStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::default(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, content_type)| content_type.clone())
    }
}

#[async_trait]
impl AvatarStorage for MemoryAvatarStorage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        check_key(key, &self.bucket)?;
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        check_key(key, &self.bucket)?;
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        check_key(key, &self.bucket)?;
        if !self.contains(key) {
            return Err(StorageError::Missing(key.to_string()));
        }
        Ok(format!("memory://{}/{}?expires={}", self.bucket, key, ttl.as_secs()))
    }
}
