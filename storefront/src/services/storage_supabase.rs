// storefront/src/services/storage_supabase.rs

use crate::config::SupabaseSettings;
use crate::errors::{AppError, Result};
use crate::services::storage::{BlobStore, SignedUpload};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{instrument, warn};

/// Supabase Storage REST API with the service-role key.
pub struct SupabaseStorage {
  http: Client,
  settings: SupabaseSettings,
}

#[derive(Deserialize)]
struct SignedUrlBody {
  #[serde(rename = "signedURL")]
  signed_url: String,
}

#[derive(Deserialize)]
struct SignedUploadBody {
  url: String,
  #[serde(default)]
  token: Option<String>,
}

impl SupabaseStorage {
  pub fn new(settings: SupabaseSettings) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(120))
      .build()
      .map_err(|e| AppError::Config(format!("cannot build storage client: {}", e)))?;
    Ok(Self { http, settings })
  }

  fn storage_url(&self, tail: &str) -> String {
    format!("{}/storage/v1{}", self.settings.url, tail)
  }

  fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    request
      .bearer_auth(&self.settings.service_role_key)
      .header("apikey", &self.settings.service_role_key)
  }

  async fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(%status, %body, "Storage request failed: {}", what);
    Err(match status {
      StatusCode::NOT_FOUND => AppError::NotFound(what.to_string()),
      StatusCode::CONFLICT => AppError::InvalidState(format!("{} already exists", what)),
      // Storage reports missing objects on sign as 400 with an "not_found" error body.
      StatusCode::BAD_REQUEST if body.contains("not_found") || body.contains("Object not found") => {
        AppError::NotFound(what.to_string())
      }
      _ => AppError::upstream("blob store", format!("{} failed with HTTP {}", what, status)),
    })
  }
}

#[async_trait]
impl BlobStore for SupabaseStorage {
  #[instrument(name = "supabase::upload", skip(self, bytes), fields(size = bytes.len()), err(Display))]
  async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
    let request = self
      .http
      .post(self.storage_url(&format!("/object/{}/{}", bucket, path)))
      .header("content-type", content_type)
      .header("x-upsert", "false")
      .body(bytes);
    let response = self
      .authorized(request)
      .send()
      .await
      .map_err(|e| AppError::upstream("blob store", e))?;
    Self::check(response, &format!("upload of {}", path)).await?;
    Ok(())
  }

  #[instrument(name = "supabase::signed_url", skip(self), err(Display))]
  async fn signed_url(&self, bucket: &str, path: &str, expiry: Duration) -> Result<String> {
    let request = self
      .http
      .post(self.storage_url(&format!("/object/sign/{}/{}", bucket, path)))
      .json(&json!({ "expiresIn": expiry.as_secs() }));
    let response = self
      .authorized(request)
      .send()
      .await
      .map_err(|e| AppError::upstream("blob store", e))?;
    let body: SignedUrlBody = Self::check(response, &format!("object {}", path)).await?.json().await?;
    Ok(self.storage_url(&body.signed_url))
  }

  #[instrument(name = "supabase::signed_upload_url", skip(self), err(Display))]
  async fn signed_upload_url(&self, bucket: &str, path: &str) -> Result<SignedUpload> {
    let request = self
      .http
      .post(self.storage_url(&format!("/object/upload/sign/{}/{}", bucket, path)));
    let response = self
      .authorized(request)
      .send()
      .await
      .map_err(|e| AppError::upstream("blob store", e))?;
    let body: SignedUploadBody = Self::check(response, &format!("upload slot {}", path)).await?.json().await?;
    Ok(SignedUpload {
      path: path.to_string(),
      signed_url: self.storage_url(&body.url),
      token: body.token,
    })
  }
}
