// storefront/src/services/storage_memory.rs

use crate::errors::{AppError, Result};
use crate::services::storage::{BlobStore, SignedUpload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
  pub bytes: Vec<u8>,
  pub content_type: String,
}

/// Bucket/path keyed blobs held in memory.
#[derive(Default)]
pub struct MemoryBlobStore {
  objects: RwLock<HashMap<(String, String), StoredBlob>>,
}

impl MemoryBlobStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn get(&self, bucket: &str, path: &str) -> Option<StoredBlob> {
    self.objects.read().await.get(&(bucket.to_string(), path.to_string())).cloned()
  }

  pub async fn paths(&self, bucket: &str) -> Vec<String> {
    let mut paths: Vec<String> = self
      .objects
      .read()
      .await
      .keys()
      .filter(|(b, _)| b == bucket)
      .map(|(_, p)| p.clone())
      .collect();
    paths.sort();
    paths
  }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
  async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
    let mut objects = self.objects.write().await;
    let key = (bucket.to_string(), path.to_string());
    if objects.contains_key(&key) {
      return Err(AppError::InvalidState(format!("object {}/{} already exists", bucket, path)));
    }
    objects.insert(
      key,
      StoredBlob {
        bytes,
        content_type: content_type.to_string(),
      },
    );
    Ok(())
  }

  async fn signed_url(&self, bucket: &str, path: &str, expiry: Duration) -> Result<String> {
    if self.get(bucket, path).await.is_none() {
      return Err(AppError::NotFound(format!("object {}/{}", bucket, path)));
    }
    Ok(format!(
      "memory://{}/{}?expires_in={}&token={}",
      bucket,
      path,
      expiry.as_secs(),
      Uuid::new_v4().simple()
    ))
  }

  async fn signed_upload_url(&self, bucket: &str, path: &str) -> Result<SignedUpload> {
    let token = Uuid::new_v4().simple().to_string();
    Ok(SignedUpload {
      path: path.to_string(),
      signed_url: format!("memory://{}/{}?upload_token={}", bucket, path, token),
      token: Some(token),
    })
  }
}
