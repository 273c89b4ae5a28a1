// storefront/src/services/payment.rs

//! Payment gateway seam: hosted checkout sessions plus signed completion events.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COMPLETED: &str = "checkout.session.completed";
pub const ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
  pub order_id: String,
  pub amount_minor_units: i64,
  pub currency: String,
  /// Shown to the customer on the hosted page.
  pub description: String,
  pub success_url: String,
  pub cancel_url: String,
  /// Same key, same session: the gateway must dedupe on it.
  pub idempotency_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
  Open,
  Complete,
  Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
  pub id: String,
  pub url: Option<String>,
  pub status: SessionStatus,
  pub amount_total: Option<i64>,
}

/// The interesting part of a paid (or being paid) checkout session event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCompletion {
  pub event_id: String,
  pub event_type: String,
  pub session_id: String,
  pub order_id: Option<String>,
  pub customer_email: Option<String>,
  pub amount_total: Option<i64>,
  /// `false` while a delayed payment method is still settling.
  pub paid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
  SessionCompleted(SessionCompletion),
  Other { event_id: String, event_type: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  fn name(&self) -> &'static str;

  async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession>;

  async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession>;

  /// Verifies `signature` against the raw `payload` and decodes it.
  fn parse_event(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent>;
}

/// Stripe's `Stripe-Signature` scheme: `t=<unix>,v1=<hex hmac-sha256 of "t.payload">`.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
  secret: String,
  tolerance: Duration,
}

impl WebhookVerifier {
  pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
    Self {
      secret: secret.into(),
      tolerance,
    }
  }

  pub fn verify(&self, payload: &[u8], header: &str, now_unix: i64) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
      match part.trim().split_once('=') {
        Some(("t", value)) => timestamp = value.parse().ok(),
        Some(("v1", value)) => candidates.push(value),
        _ => {}
      }
    }

    let timestamp = timestamp.ok_or_else(|| AppError::SignatureInvalid("missing timestamp".to_string()))?;
    if candidates.is_empty() {
      return Err(AppError::SignatureInvalid("missing v1 signature".to_string()));
    }
    if now_unix.abs_diff(timestamp) > self.tolerance.as_secs() {
      return Err(AppError::SignatureInvalid("timestamp outside tolerance".to_string()));
    }

    // Several v1 entries appear while a secret is being rolled.
    let matched = candidates.iter().any(|candidate| {
      let Ok(expected) = hex::decode(candidate) else {
        return false;
      };
      self.mac(timestamp, payload).map(|mac| mac.verify_slice(&expected).is_ok()).unwrap_or(false)
    });
    if matched {
      Ok(())
    } else {
      Err(AppError::SignatureInvalid("no matching signature".to_string()))
    }
  }

  /// Builds a header the way the gateway does. Used by the mock gateway and tests.
  pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
    let signature = hex::encode(self.mac(timestamp, payload)?.finalize().into_bytes());
    Ok(format!("t={},v1={}", timestamp, signature))
  }

  fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
      .map_err(|e| AppError::Config(format!("unusable webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
  }
}

#[derive(Deserialize)]
struct RawEvent {
  id: String,
  #[serde(rename = "type")]
  event_type: String,
  data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
  object: serde_json::Value,
}

#[derive(Deserialize)]
struct RawSessionObject {
  id: String,
  #[serde(default)]
  client_reference_id: Option<String>,
  #[serde(default)]
  metadata: HashMap<String, String>,
  #[serde(default)]
  customer_details: Option<RawCustomerDetails>,
  #[serde(default)]
  customer_email: Option<String>,
  #[serde(default)]
  amount_total: Option<i64>,
  #[serde(default)]
  payment_status: Option<String>,
}

#[derive(Deserialize)]
struct RawCustomerDetails {
  #[serde(default)]
  email: Option<String>,
}

/// Decodes a verified event body.
pub fn decode_event(payload: &[u8]) -> Result<GatewayEvent> {
  let raw: RawEvent =
    serde_json::from_slice(payload).map_err(|e| AppError::InvalidRequest(format!("malformed event: {}", e)))?;

  if raw.event_type != SESSION_COMPLETED && raw.event_type != ASYNC_PAYMENT_SUCCEEDED {
    return Ok(GatewayEvent::Other {
      event_id: raw.id,
      event_type: raw.event_type,
    });
  }

  let session: RawSessionObject = serde_json::from_value(raw.data.object)
    .map_err(|e| AppError::InvalidRequest(format!("malformed checkout session: {}", e)))?;
  let order_id = session.metadata.get("order_id").cloned().or(session.client_reference_id);
  let customer_email = session
    .customer_details
    .and_then(|d| d.email)
    .or(session.customer_email)
    .map(|e| e.trim().to_string())
    .filter(|e| !e.is_empty());
  // Only the async success event settles a session that completed unpaid.
  let paid = raw.event_type == ASYNC_PAYMENT_SUCCEEDED || session.payment_status.as_deref() != Some("unpaid");

  Ok(GatewayEvent::SessionCompleted(SessionCompletion {
    event_id: raw.id,
    event_type: raw.event_type,
    session_id: session.id,
    order_id,
    customer_email,
    amount_total: session.amount_total,
    paid,
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  const NOW: i64 = 1_700_000_000;

  fn verifier() -> WebhookVerifier {
    WebhookVerifier::new("whsec_test", Duration::from_secs(300))
  }

  #[test]
  fn signed_payloads_verify() {
    let payload = br#"{"id":"evt_1"}"#;
    let header = verifier().sign(payload, NOW).unwrap();
    assert!(verifier().verify(payload, &header, NOW + 10).is_ok());
  }

  #[test]
  fn tampering_and_stale_timestamps_are_rejected() {
    let header = verifier().sign(b"original", NOW).unwrap();
    assert!(matches!(
      verifier().verify(b"tampered", &header, NOW),
      Err(AppError::SignatureInvalid(_))
    ));
    assert!(verifier().verify(b"original", &header, NOW + 301).is_err());
    assert!(verifier().verify(b"original", "v1=abc", NOW).is_err());
    assert!(verifier().verify(b"original", "garbage", NOW).is_err());

    let other = WebhookVerifier::new("whsec_other", Duration::from_secs(300));
    assert!(other.verify(b"original", &header, NOW).is_err());
  }

  #[test]
  fn any_matching_v1_entry_is_enough() {
    let good = verifier().sign(b"body", NOW).unwrap();
    let v1 = good.split(",v1=").nth(1).unwrap();
    let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), v1);
    assert!(verifier().verify(b"body", &header, NOW).is_ok());
  }

  #[test]
  fn completion_events_are_decoded() {
    let payload = json!({
      "id": "evt_1",
      "type": "checkout.session.completed",
      "data": { "object": {
        "id": "cs_1",
        "metadata": { "order_id": "tok-A" },
        "customer_details": { "email": "buyer@example.com" },
        "amount_total": 2000,
        "payment_status": "paid"
      }}
    });
    let event = decode_event(payload.to_string().as_bytes()).unwrap();
    let GatewayEvent::SessionCompleted(done) = event else {
      panic!("expected a completion");
    };
    assert_eq!(done.session_id, "cs_1");
    assert_eq!(done.order_id.as_deref(), Some("tok-A"));
    assert_eq!(done.customer_email.as_deref(), Some("buyer@example.com"));
    assert!(done.paid);
  }

  #[test]
  fn unpaid_completions_and_other_types() {
    let unpaid = json!({
      "id": "evt_2",
      "type": "checkout.session.completed",
      "data": { "object": { "id": "cs_2", "client_reference_id": "tok-B", "payment_status": "unpaid" } }
    });
    let GatewayEvent::SessionCompleted(done) = decode_event(unpaid.to_string().as_bytes()).unwrap() else {
      panic!("expected a completion");
    };
    assert!(!done.paid);
    assert_eq!(done.order_id.as_deref(), Some("tok-B"));

    let other = json!({ "id": "evt_3", "type": "charge.refunded", "data": { "object": {} } });
    assert!(matches!(
      decode_event(other.to_string().as_bytes()).unwrap(),
      GatewayEvent::Other { .. }
    ));
    assert!(decode_event(b"not json").is_err());
  }
}
