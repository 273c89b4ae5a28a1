// storefront/src/services/auth_service.rs

//! Admin authorization: a single bearer token checked against an Argon2 hash.

use crate::errors::AppError;
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use async_trait::async_trait;
use tracing::{debug, error, instrument, warn};

#[async_trait]
pub trait AdminAuthority: Send + Sync {
  /// `credential` is the raw bearer token, `None` when the request carried none.
  async fn is_admin(&self, credential: Option<&str>) -> Result<bool, AppError>;
}

/// Produces the PHC string stored in `ADMIN_TOKEN_HASH`.
#[instrument(name = "auth_service::hash_token", skip(token), err(Display))]
pub fn hash_token(token: &str) -> Result<String, AppError> {
  if token.trim().len() < 16 {
    return Err(AppError::InvalidRequest(
      "admin token must be at least 16 characters".to_string(),
    ));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(token.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "Argon2 hashing failed.");
      AppError::Internal(format!("token hashing failed: {}", e))
    })
}

#[instrument(name = "auth_service::verify_token", skip_all, err(Display))]
pub fn verify_token(stored_hash: &str, provided: &str) -> Result<bool, AppError> {
  if provided.is_empty() {
    return Ok(false);
  }
  let parsed = PasswordHash::new(stored_hash).map_err(|e| {
    error!(error = %e, "Stored admin token hash is not a valid PHC string.");
    AppError::Config(format!("invalid ADMIN_TOKEN_HASH: {}", e))
  })?;
  match Argon2::default().verify_password(provided.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Admin token mismatch.");
      Ok(false)
    }
    Err(e) => Err(AppError::Internal(format!("token verification failed: {}", e))),
  }
}

/// Admits callers presenting the token whose hash was configured.
pub struct TokenAuthority {
  token_hash: Option<String>,
}

impl TokenAuthority {
  pub fn new(token_hash: Option<String>) -> Self {
    if token_hash.is_none() {
      warn!("ADMIN_TOKEN_HASH is not set; admin endpoints will refuse every request.");
    }
    Self { token_hash }
  }
}

#[async_trait]
impl AdminAuthority for TokenAuthority {
  async fn is_admin(&self, credential: Option<&str>) -> Result<bool, AppError> {
    let (Some(hash), Some(token)) = (self.token_hash.clone(), credential.map(str::to_string)) else {
      return Ok(false);
    };
    // Argon2 verification is CPU-bound.
    tokio::task::spawn_blocking(move || verify_token(&hash, &token))
      .await
      .map_err(|e| AppError::Internal(format!("token verification task failed: {}", e)))?
  }
}
