// storefront/tests/common/mod.rs
#![allow(dead_code)]

use lightbox::config::AppConfig;
use lightbox::errors::AppError;
use lightbox::models::{CartLine, Order};
use lightbox::operations;
use lightbox::pipelines::contexts::PaymentEventOutcome;
use lightbox::pipelines::register_all_pipelines;
use lightbox::services::auth_service::{hash_token, TokenAuthority};
use lightbox::services::email_mock::MockMailer;
use lightbox::services::payment::WebhookVerifier;
use lightbox::services::payment_mock::MockGateway;
use lightbox::services::storage_memory::MemoryBlobStore;
use lightbox::services::store_memory::MemoryOrderStore;
use lightbox::state::AppState;
use lightbox_flow::Registry;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

pub const ADMIN_TOKEN: &str = "admin-test-token-0123456789";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const BASE_URL: &str = "https://shop.test";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

static ADMIN_TOKEN_HASH: Lazy<String> = Lazy::new(|| hash_token(ADMIN_TOKEN).unwrap());

/// Application state over in-memory collaborators, with typed handles kept for assertions.
pub struct TestApp {
  pub state: AppState,
  pub orders: Arc<MemoryOrderStore>,
  pub gateway: Arc<MockGateway>,
  pub blobs: Arc<MemoryBlobStore>,
  pub mailer: Arc<MockMailer>,
}

pub fn test_config(extra: &[(&str, &str)]) -> AppConfig {
  let mut vars: HashMap<String, String> = HashMap::from([
    ("APP_BASE_URL".to_string(), BASE_URL.to_string()),
    ("STRIPE_WEBHOOK_SECRET".to_string(), WEBHOOK_SECRET.to_string()),
    ("STORE_NAME".to_string(), "Lightbox Test".to_string()),
    ("ADMIN_TOKEN_HASH".to_string(), ADMIN_TOKEN_HASH.clone()),
  ]);
  for (k, v) in extra {
    vars.insert(k.to_string(), v.to_string());
  }
  AppConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

pub fn test_app() -> TestApp {
  test_app_with(&[])
}

pub fn test_app_with(extra: &[(&str, &str)]) -> TestApp {
  setup_tracing();
  let config = Arc::new(test_config(extra));
  let orders = Arc::new(MemoryOrderStore::new());
  let gateway = Arc::new(MockGateway::new(
    BASE_URL,
    WebhookVerifier::new(WEBHOOK_SECRET, Duration::from_secs(300)),
  ));
  let blobs = Arc::new(MemoryBlobStore::new());
  let mailer = Arc::new(MockMailer::new());
  let flows = Arc::new(Registry::<AppError>::new());
  register_all_pipelines(&flows);

  let state = AppState {
    config: config.clone(),
    flows,
    orders: orders.clone(),
    payments: gateway.clone(),
    blobs: blobs.clone(),
    mailer: mailer.clone(),
    admins: Arc::new(TokenAuthority::new(config.admin_token_hash.clone())),
  };
  TestApp {
    state,
    orders,
    gateway,
    blobs,
    mailer,
  }
}

pub fn cart(photos: i64) -> Vec<CartLine> {
  vec![CartLine {
    product_id: "photo-pack".to_string(),
    quantity: photos,
  }]
}

pub async fn order(app: &TestApp, order_id: &str) -> Order {
  operations::get_order(&app.state, order_id).await.unwrap()
}

/// Delivers a signed completion event for the order's attached session.
pub async fn pay(app: &TestApp, order_id: &str, email: Option<&str>) -> PaymentEventOutcome {
  let current = order(app, order_id).await;
  let session_id = current.payment_session_ref.clone().expect("order has no session attached");
  let (payload, signature) = app
    .gateway
    .completion_event(&session_id, order_id, email, current.total_amount_minor_units)
    .unwrap();
  operations::handle_payment_event(&app.state, payload, Some(signature))
    .await
    .unwrap()
}

/// Checkout plus payment: leaves `order_id` PAID with `email` as recipient.
pub async fn paid_order(app: &TestApp, order_id: &str, photos: i64, email: Option<&str>) -> Order {
  operations::initiate_checkout(&app.state, order_id, cart(photos)).await.unwrap();
  pay(app, order_id, email).await;
  order(app, order_id).await
}
