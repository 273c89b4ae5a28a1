// storefront/tests/stripe_gateway_tests.rs

use lightbox::config::StripeSettings;
use lightbox::errors::AppError;
use lightbox::services::payment::{CheckoutSessionRequest, PaymentGateway, SessionStatus, WebhookVerifier};
use lightbox::services::payment_stripe::StripeGateway;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer) -> StripeGateway {
  StripeGateway::new(
    StripeSettings {
      secret_key: "sk_test_123".to_string(),
      api_base: server.uri(),
    },
    WebhookVerifier::new("whsec_test", Duration::from_secs(300)),
  )
  .unwrap()
}

fn request() -> CheckoutSessionRequest {
  CheckoutSessionRequest {
    order_id: "tok-A".to_string(),
    amount_minor_units: 12800,
    currency: "eur".to_string(),
    description: "Lightbox: 21 photo(s)".to_string(),
    success_url: "https://shop.test/success".to_string(),
    cancel_url: "https://shop.test/cart".to_string(),
    idempotency_key: "tok-A".to_string(),
  }
}

#[tokio::test]
async fn sessions_are_created_with_the_idempotency_key_and_order_reference() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/v1/checkout/sessions"))
    .and(header("Idempotency-Key", "tok-A"))
    .and(header("Authorization", "Bearer sk_test_123"))
    .and(body_string_contains("client_reference_id=tok-A"))
    .and(body_string_contains("unit_amount%5D=12800"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "id": "cs_test_1",
      "url": "https://checkout.stripe.test/c/cs_test_1",
      "status": "open",
      "amount_total": 12800
    })))
    .expect(1)
    .mount(&server)
    .await;

  let stripe = gateway(&server);
  assert_eq!(stripe.name(), "stripe");
  let session = stripe.create_checkout_session(&request()).await.unwrap();
  assert_eq!(session.id, "cs_test_1");
  assert_eq!(session.status, SessionStatus::Open);
  assert_eq!(session.amount_total, Some(12800));
  assert_eq!(session.url.as_deref(), Some("https://checkout.stripe.test/c/cs_test_1"));
}

#[tokio::test]
async fn client_errors_are_rejections_and_server_errors_are_retryable() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/v1/checkout/sessions"))
    .respond_with(ResponseTemplate::new(400).set_body_json(json!({
      "error": { "type": "invalid_request_error", "message": "Invalid currency" }
    })))
    .up_to_n_times(1)
    .mount(&server)
    .await;
  Mock::given(method("POST"))
    .and(path("/v1/checkout/sessions"))
    .respond_with(ResponseTemplate::new(503))
    .mount(&server)
    .await;

  let gateway = gateway(&server);
  let rejected = gateway.create_checkout_session(&request()).await.unwrap_err();
  match rejected {
    AppError::GatewayRejected(detail) => assert!(detail.contains("Invalid currency")),
    other => panic!("expected a rejection, got {:?}", other),
  }

  let unavailable = gateway.create_checkout_session(&request()).await.unwrap_err();
  assert!(unavailable.is_retryable());
}

#[tokio::test]
async fn sessions_are_retrieved_with_their_status() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/v1/checkout/sessions/cs_test_9"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "id": "cs_test_9",
      "url": null,
      "status": "expired",
      "amount_total": 800
    })))
    .mount(&server)
    .await;

  let session = gateway(&server).retrieve_session("cs_test_9").await.unwrap();
  assert_eq!(session.status, SessionStatus::Expired);
  assert!(session.url.is_none());
}

#[tokio::test]
async fn events_are_verified_before_decoding() {
  let server = MockServer::start().await;
  let gateway = gateway(&server);
  let payload = json!({
    "id": "evt_1",
    "type": "checkout.session.completed",
    "data": { "object": { "id": "cs_test_1", "client_reference_id": "tok-A", "payment_status": "paid" } }
  })
  .to_string()
  .into_bytes();

  let signature = WebhookVerifier::new("whsec_test", Duration::from_secs(300))
    .sign(&payload, chrono::Utc::now().timestamp())
    .unwrap();
  assert!(gateway.parse_event(&payload, &signature).is_ok());

  let forged = WebhookVerifier::new("whsec_other", Duration::from_secs(300))
    .sign(&payload, chrono::Utc::now().timestamp())
    .unwrap();
  assert!(matches!(
    gateway.parse_event(&payload, &forged),
    Err(AppError::SignatureInvalid(_))
  ));
}
