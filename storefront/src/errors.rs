// storefront/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use lightbox_flow::FlowError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Invalid request: {0}")]
  InvalidRequest(String),

  #[error("Invalid status: {0}")]
  InvalidStatus(String),

  #[error("Invalid state: {0}")]
  InvalidState(String),

  #[error("Cart is empty")]
  EmptyCart,

  #[error("Order {0} has no recipient email")]
  MissingRecipient(String),

  #[error("Resource not found: {0}")]
  NotFound(String),

  #[error("Unauthorized: {0}")]
  Unauthorized(String),

  /// Transient failure of a collaborator. Every mutating operation is idempotent, so the
  /// caller may retry.
  #[error("{service} unavailable: {message}")]
  UpstreamUnavailable { service: &'static str, message: String },

  /// The payment gateway refused to create or return a session.
  #[error("Payment gateway rejected the request: {0}")]
  GatewayRejected(String),

  #[error("Webhook signature invalid: {0}")]
  SignatureInvalid(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn upstream(service: &'static str, message: impl std::fmt::Display) -> Self {
    AppError::UpstreamUnavailable {
      service,
      message: message.to_string(),
    }
  }

  /// Stable machine-readable name, sent to clients next to the message.
  pub fn kind(&self) -> &'static str {
    match self {
      AppError::InvalidRequest(_) => "InvalidRequest",
      AppError::InvalidStatus(_) => "InvalidStatus",
      AppError::InvalidState(_) => "InvalidState",
      AppError::EmptyCart => "EmptyCart",
      AppError::MissingRecipient(_) => "MissingRecipient",
      AppError::NotFound(_) => "NotFound",
      AppError::Unauthorized(_) => "Unauthorized",
      AppError::UpstreamUnavailable { .. } => "UpstreamUnavailable",
      AppError::GatewayRejected(_) => "GatewayRejected",
      AppError::SignatureInvalid(_) => "SignatureInvalid",
      AppError::Config(_) => "Config",
      AppError::Workflow { .. } => "Workflow",
      AppError::Internal(_) => "Internal",
    }
  }

  pub fn is_retryable(&self) -> bool {
    matches!(self, AppError::UpstreamUnavailable { .. })
  }
}

impl From<sqlx::Error> for AppError {
  fn from(err: sqlx::Error) -> Self {
    match err {
      sqlx::Error::RowNotFound => AppError::NotFound("order".to_string()),
      other => AppError::upstream("record store", other),
    }
  }
}

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    AppError::upstream("http collaborator", err)
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::InvalidRequest(_) | AppError::InvalidStatus(_) | AppError::EmptyCart => StatusCode::BAD_REQUEST,
      AppError::SignatureInvalid(_) => StatusCode::BAD_REQUEST,
      AppError::MissingRecipient(_) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::InvalidState(_) => StatusCode::CONFLICT,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      AppError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
      AppError::GatewayRejected(_) => StatusCode::BAD_GATEWAY,
      AppError::Config(_) | AppError::Workflow { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, kind = self.kind(), "Responding with error");
    } else {
      tracing::warn!(application_error = %self, kind = self.kind(), "Responding with error");
    }
    let message = match self {
      // Internal details stay in the logs.
      AppError::Config(_) | AppError::Workflow { .. } | AppError::Internal(_) => "An internal error occurred".to_string(),
      other => other.to_string(),
    };
    HttpResponse::build(status).json(json!({
      "error": message,
      "kind": self.kind(),
      "retryable": self.is_retryable(),
    }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn taxonomy_maps_to_http_statuses() {
    assert_eq!(AppError::EmptyCart.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::InvalidState("x".into()).status_code(), StatusCode::CONFLICT);
    assert_eq!(AppError::MissingRecipient("o".into()).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(AppError::upstream("gateway", "timeout").status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(AppError::GatewayRejected("no".into()).status_code(), StatusCode::BAD_GATEWAY);
  }

  #[test]
  fn only_upstream_failures_are_retryable() {
    assert!(AppError::upstream("mailer", "503").is_retryable());
    assert!(!AppError::GatewayRejected("card".into()).is_retryable());
    assert!(!AppError::SignatureInvalid("bad".into()).is_retryable());
  }

  #[test]
  fn missing_rows_become_not_found() {
    assert!(matches!(AppError::from(sqlx::Error::RowNotFound), AppError::NotFound(_)));
    assert!(matches!(
      AppError::from(sqlx::Error::PoolTimedOut),
      AppError::UpstreamUnavailable { service: "record store", .. }
    ));
  }
}
