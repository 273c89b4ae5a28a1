// storefront/src/services/payment_mock.rs

use crate::errors::{AppError, Result};
use crate::services::payment::{
  decode_event, CheckoutSession, CheckoutSessionRequest, GatewayEvent, PaymentGateway, SessionStatus, WebhookVerifier,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[derive(Default)]
struct Ledger {
  sessions: HashMap<String, CheckoutSession>,
  by_key: HashMap<String, String>,
  requests: Vec<CheckoutSessionRequest>,
}

/// In-process gateway for development and tests. Dedupes on the idempotency key the way
/// the real gateway does and signs events with the configured webhook secret.
pub struct MockGateway {
  base_url: String,
  verifier: WebhookVerifier,
  ledger: Mutex<Ledger>,
  reject_next: Mutex<Option<AppError>>,
}

impl MockGateway {
  pub fn new(base_url: impl Into<String>, verifier: WebhookVerifier) -> Self {
    Self {
      base_url: base_url.into(),
      verifier,
      ledger: Mutex::new(Ledger::default()),
      reject_next: Mutex::new(None),
    }
  }

  /// Number of distinct sessions ever created.
  pub async fn session_count(&self) -> usize {
    self.ledger.lock().await.sessions.len()
  }

  pub async fn requests(&self) -> Vec<CheckoutSessionRequest> {
    self.ledger.lock().await.requests.clone()
  }

  pub async fn set_session_status(&self, session_id: &str, status: SessionStatus) {
    if let Some(session) = self.ledger.lock().await.sessions.get_mut(session_id) {
      session.status = status;
      if status != SessionStatus::Open {
        session.url = None;
      }
    }
  }

  /// Makes the next session creation fail with `err`.
  pub async fn fail_next(&self, err: AppError) {
    *self.reject_next.lock().await = Some(err);
  }

  /// A signed `checkout.session.completed` payload and its signature header.
  pub fn completion_event(
    &self,
    session_id: &str,
    order_id: &str,
    email: Option<&str>,
    amount_total: i64,
  ) -> Result<(Vec<u8>, String)> {
    let payload = json!({
      "id": format!("evt_{}", Uuid::new_v4().simple()),
      "type": "checkout.session.completed",
      "data": { "object": {
        "id": session_id,
        "client_reference_id": order_id,
        "metadata": { "order_id": order_id },
        "customer_details": { "email": email },
        "amount_total": amount_total,
        "payment_status": "paid",
      }}
    })
    .to_string()
    .into_bytes();
    let signature = self.verifier.sign(&payload, chrono::Utc::now().timestamp())?;
    Ok((payload, signature))
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  fn name(&self) -> &'static str {
    "mock"
  }

  async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession> {
    if let Some(err) = self.reject_next.lock().await.take() {
      return Err(err);
    }

    let mut ledger = self.ledger.lock().await;
    ledger.requests.push(request.clone());
    if let Some(existing) = ledger.by_key.get(&request.idempotency_key).cloned() {
      if let Some(session) = ledger.sessions.get(&existing) {
        return Ok(session.clone());
      }
    }

    let id = format!("cs_mock_{}", Uuid::new_v4().simple());
    let session = CheckoutSession {
      id: id.clone(),
      url: Some(format!("{}/mock-checkout/{}", self.base_url, id)),
      status: SessionStatus::Open,
      amount_total: Some(request.amount_minor_units),
    };
    ledger.by_key.insert(request.idempotency_key.clone(), id.clone());
    ledger.sessions.insert(id, session.clone());
    info!(session_id = %session.id, order_id = %request.order_id, "Mock checkout session created.");
    Ok(session)
  }

  async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession> {
    self
      .ledger
      .lock()
      .await
      .sessions
      .get(session_id)
      .cloned()
      .ok_or_else(|| AppError::GatewayRejected(format!("no such checkout session: {}", session_id)))
  }

  fn parse_event(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent> {
    self.verifier.verify(payload, signature, chrono::Utc::now().timestamp())?;
    decode_event(payload)
  }
}
