// storefront/src/state.rs

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::{AdminAuthority, BlobStore, Mailer, OrderStore, PaymentGateway};
use lightbox_flow::Registry;
use std::sync::Arc;

/// Everything a request needs, built once at startup. Cloning clones handles only.
#[derive(Clone)]
pub struct AppState {
  pub config: Arc<AppConfig>,
  pub flows: Arc<Registry<AppError>>,
  pub orders: Arc<dyn OrderStore>,
  pub payments: Arc<dyn PaymentGateway>,
  pub blobs: Arc<dyn BlobStore>,
  pub mailer: Arc<dyn Mailer>,
  pub admins: Arc<dyn AdminAuthority>,
}
