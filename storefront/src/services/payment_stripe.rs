// storefront/src/services/payment_stripe.rs

use crate::config::StripeSettings;
use crate::errors::{AppError, Result};
use crate::services::payment::{
  decode_event, CheckoutSession, CheckoutSessionRequest, GatewayEvent, PaymentGateway, SessionStatus, WebhookVerifier,
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Stripe Checkout Sessions over the REST API.
pub struct StripeGateway {
  http: Client,
  settings: StripeSettings,
  verifier: WebhookVerifier,
}

#[derive(Deserialize)]
struct SessionBody {
  id: String,
  #[serde(default)]
  url: Option<String>,
  #[serde(default)]
  status: Option<SessionStatus>,
  #[serde(default)]
  amount_total: Option<i64>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
  error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
  #[serde(default)]
  message: Option<String>,
  #[serde(default, rename = "type")]
  kind: Option<String>,
}

impl StripeGateway {
  pub fn new(settings: StripeSettings, verifier: WebhookVerifier) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| AppError::Config(format!("cannot build Stripe client: {}", e)))?;
    Ok(Self {
      http,
      settings,
      verifier,
    })
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}/v1/{}", self.settings.api_base.trim_end_matches('/'), path)
  }

  async fn read_session(response: Response) -> Result<CheckoutSession> {
    let status = response.status();
    if status.is_success() {
      let body: SessionBody = response.json().await?;
      return Ok(CheckoutSession {
        id: body.id,
        url: body.url,
        status: body.status.unwrap_or(SessionStatus::Open),
        amount_total: body.amount_total,
      });
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorEnvelope>(&text)
      .ok()
      .map(|env| {
        format!(
          "{}: {}",
          env.error.kind.unwrap_or_else(|| "error".to_string()),
          env.error.message.unwrap_or_default()
        )
      })
      .unwrap_or_else(|| format!("HTTP {}", status));

    if status.is_server_error() || status.as_u16() == 429 {
      warn!(%status, %detail, "Stripe is unavailable.");
      Err(AppError::upstream("payment gateway", detail))
    } else {
      warn!(%status, %detail, "Stripe rejected the request.");
      Err(AppError::GatewayRejected(detail))
    }
  }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
  fn name(&self) -> &'static str {
    "stripe"
  }

  #[instrument(name = "stripe::create_checkout_session", skip(self, request), fields(order_id = %request.order_id, amount = request.amount_minor_units), err(Display))]
  async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession> {
    let form = [
      ("mode", "payment".to_string()),
      ("success_url", request.success_url.clone()),
      ("cancel_url", request.cancel_url.clone()),
      ("client_reference_id", request.order_id.clone()),
      ("metadata[order_id]", request.order_id.clone()),
      ("line_items[0][quantity]", "1".to_string()),
      ("line_items[0][price_data][currency]", request.currency.clone()),
      ("line_items[0][price_data][unit_amount]", request.amount_minor_units.to_string()),
      ("line_items[0][price_data][product_data][name]", request.description.clone()),
    ];

    let response = self
      .http
      .post(self.endpoint("checkout/sessions"))
      .bearer_auth(&self.settings.secret_key)
      .header("Idempotency-Key", &request.idempotency_key)
      .form(&form)
      .send()
      .await
      .map_err(|e| AppError::upstream("payment gateway", e))?;

    let session = Self::read_session(response).await?;
    info!(session_id = %session.id, "Checkout session created.");
    Ok(session)
  }

  #[instrument(name = "stripe::retrieve_session", skip(self), err(Display))]
  async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession> {
    let response = self
      .http
      .get(self.endpoint(&format!("checkout/sessions/{}", session_id)))
      .bearer_auth(&self.settings.secret_key)
      .send()
      .await
      .map_err(|e| AppError::upstream("payment gateway", e))?;
    Self::read_session(response).await
  }

  fn parse_event(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent> {
    self.verifier.verify(payload, signature, chrono::Utc::now().timestamp())?;
    decode_event(payload)
  }
}
