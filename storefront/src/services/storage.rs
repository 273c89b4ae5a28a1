// storefront/src/services/storage.rs

//! Private blob storage for delivered originals, plus object naming under an order.

use crate::errors::Result;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

const MAX_FILE_NAME_CHARS: usize = 120;

/// A URL the admin client can `PUT` an object to without holding storage credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUpload {
  pub path: String,
  pub signed_url: String,
  pub token: Option<String>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
  /// Stores a new object. Existing objects are never overwritten.
  async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

  /// Time-limited retrieval link for an existing object.
  async fn signed_url(&self, bucket: &str, path: &str, expiry: Duration) -> Result<String>;

  async fn signed_upload_url(&self, bucket: &str, path: &str) -> Result<SignedUpload>;
}

/// Keeps the last path component and replaces anything outside `[A-Za-z0-9._-() ]`.
pub fn sanitize_file_name(name: &str) -> String {
  let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
  let cleaned: String = base
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '(' | ')' | ' ') {
        c
      } else {
        '_'
      }
    })
    .take(MAX_FILE_NAME_CHARS)
    .collect();
  if cleaned.trim_matches(['.', ' ']).is_empty() {
    "photo.jpg".to_string()
  } else {
    cleaned
  }
}

/// Lower-cased extension of an already sanitized name, `jpg` when there is none.
pub fn file_extension(safe_name: &str) -> String {
  match safe_name.rsplit_once('.') {
    Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
    _ => "jpg".to_string(),
  }
}

pub fn order_prefix(order_id: &str) -> String {
  format!("orders/{}/", order_id)
}

/// `orders/{id}/{millis}-{random6}.{ext}`
pub fn delivery_object_path(order_id: &str, safe_name: &str, unix_millis: i64) -> String {
  let suffix: String = rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(6)
    .map(|b| char::from(b).to_ascii_lowercase())
    .collect();
  format!(
    "{}{}-{}.{}",
    order_prefix(order_id),
    unix_millis,
    suffix,
    file_extension(safe_name)
  )
}

/// `orders/{id}/{millis}-{name}` for direct uploads.
pub fn staged_object_path(order_id: &str, safe_name: &str, unix_millis: i64) -> String {
  format!("{}{}-{}", order_prefix(order_id), unix_millis, safe_name.replace(' ', "_"))
}

/// Whether `path` names an object directly inside the order's folder.
pub fn belongs_to_order(order_id: &str, path: &str) -> bool {
  match path.strip_prefix(&order_prefix(order_id)) {
    Some(rest) => !rest.is_empty() && !rest.contains('/') && !rest.contains("..") && !rest.contains('\\'),
    None => false,
  }
}
